use super::*;

fn parse(source: &str) -> SchemaTree {
    match SchemaTree::from_styx(source) {
        Ok(tree) => tree,
        Err(e) => panic!("{e}"),
    }
}

#[test]
fn parses_groups_in_declaration_order() {
    let tree = parse(
        r#"{
            customer {customerId {type @string, primary-key true}, name {type @string}}
            order {orderId {type @string, primary-key true}, total {type @number}}
        }"#,
    );

    let groups: Vec<_> = tree.groups().map(|(name, _)| name).collect();
    assert_eq!(groups, vec!["customer", "order"]);

    let customer = &tree.0["customer"];
    let fields: Vec<_> = customer.fields().map(|(name, _)| name).collect();
    assert_eq!(fields, vec!["customerId", "name"]);
    assert!(customer.0["customerId"].is_primary_key());
    assert!(!customer.0["name"].is_primary_key());
    assert_eq!(tree.0["order"].0["total"].field_type, FieldType::Number);
}

#[test]
fn parses_foreign_key_paths() {
    let tree = parse(
        r#"{
            order {
                customerId {type @string, foreign-key @direct{table customer, field customerId}}
                sku {type @string, foreign-key @nested{table catalog, collection items, field sku}}
            }
        }"#,
    );

    let order = &tree.0["order"];
    assert_eq!(
        order.0["customerId"].foreign_key,
        Some(ForeignKeyPath::direct("customer", "customerId"))
    );
    assert_eq!(
        order.0["sku"].foreign_key,
        Some(ForeignKeyPath::nested("catalog", "items", "sku"))
    );
}

#[test]
fn parses_nested_items() {
    let tree = parse(
        r#"{
            order {
                orderId {type @string, primary-key true}
                lines {type @array, items {sku {type @string}, quantity {type @number}}}
                tags {type @array}
            }
        }"#,
    );

    let order = &tree.0["order"];
    let lines = order.0["lines"]
        .repeated_object()
        .expect("lines should be a repeated object");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines.0["quantity"].field_type, FieldType::Number);
    assert!(order.0["tags"].repeated_object().is_none());
}

#[test]
fn builder_matches_parsed_document() {
    let parsed = parse(
        r#"{
            customer {customerId {type @string, primary-key true}, joined {type @date}}
        }"#,
    );

    let built = SchemaTree::new().group(
        "customer",
        ObjectSchema::new()
            .field("customerId", FieldSpec::string().primary_key())
            .field("joined", FieldSpec::date()),
    );

    assert_eq!(parsed, built);
}

#[test]
fn syntax_errors_name_the_file() {
    let err = SchemaTree::from_styx_named("broken.styx", "{customer {id {type @nope}}}")
        .expect_err("unknown type tag should fail");
    assert!(err.to_string().contains("broken.styx"), "{err}");
}

#[test]
fn missing_file_is_an_io_error() {
    let err = SchemaTree::load("/definitely/not/here.styx").expect_err("file does not exist");
    assert!(matches!(err, SchemaParseError::Io { .. }));
}

#[test]
fn direct_path_resolves_to_table_and_field() {
    let path = ForeignKeyPath::direct("customer", "customerId");
    assert_eq!(path.resolve(), ("customer".to_string(), "customerId"));
}

#[test]
fn nested_path_resolves_through_child_table() {
    let path = ForeignKeyPath::nested("order", "lines", "sku");
    assert_eq!(path.resolve(), ("order_lines".to_string(), "sku"));
    assert_eq!(path.to_string(), "order[lines].sku");
}

#[test]
fn array_without_items_is_not_a_repeated_object() {
    assert!(FieldSpec::array().repeated_object().is_none());
    assert!(
        FieldSpec::array_of(ObjectSchema::new().field("x", FieldSpec::number()))
            .repeated_object()
            .is_some()
    );
    // items on a scalar are ignored
    let mut odd = FieldSpec::string();
    odd.items = Some(ObjectSchema::new());
    assert!(odd.repeated_object().is_none());
}
