use llm_scraper::{ExtractionSchema, ScrapeError, CONTAINER_KEY};
use std::collections::HashSet;

#[test]
fn schema_attribute_set_equals_input_set() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["Name of item", "Price"],
        vec!["title"],
        vec!["a", "b", "c", "d", "e", "f"],
        vec!["field with spaces", "unicode·field", "UPPER", "lower"],
    ];

    for fields in cases {
        let schema = ExtractionSchema::build(fields.clone()).unwrap();

        let expected: HashSet<&str> = fields.iter().copied().collect();
        let actual: HashSet<&str> = schema.listing_schema()["properties"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(actual, expected);

        // Every field is required and string-typed.
        let required: HashSet<&str> = schema.listing_schema()["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, expected);

        for field in &fields {
            assert_eq!(
                schema.listing_schema()["properties"][*field]["type"],
                "string"
            );
        }
    }
}

#[test]
fn container_always_wraps_the_same_key() {
    for fields in [vec!["x"], vec!["x", "y", "z"]] {
        let schema = ExtractionSchema::build(fields).unwrap();
        let container = schema.container_schema();
        assert!(container["properties"][CONTAINER_KEY].is_object());
        assert_eq!(container["required"].as_array().unwrap().len(), 1);
    }
}

#[test]
fn builder_is_deterministic_for_identical_input() {
    let fields = ["Price", "Availability", "Name of item"];
    let first = ExtractionSchema::build(fields).unwrap();
    let second = ExtractionSchema::build(fields).unwrap();
    assert_eq!(first.listing_schema(), second.listing_schema());
    assert_eq!(first.container_schema(), second.container_schema());
}

#[test]
fn invalid_field_lists_are_rejected() {
    assert!(matches!(
        ExtractionSchema::build(Vec::<String>::new()).unwrap_err(),
        ScrapeError::SchemaError(_)
    ));
    assert!(matches!(
        ExtractionSchema::build(["Price", "Name", "Price"]).unwrap_err(),
        ScrapeError::SchemaError(_)
    ));
    assert!(matches!(
        ExtractionSchema::build(["ok", "   "]).unwrap_err(),
        ScrapeError::SchemaError(_)
    ));
}
