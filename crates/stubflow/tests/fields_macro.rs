use stubflow::{Value, fields};

#[test]
fn empty_fields() {
    let f = fields! {};
    assert!(f.is_empty());
}

#[test]
fn mixed_values() {
    let f = fields! {
        "count" => 3_i64,
        "name" => "web",
        "ratio" => 0.5_f64,
        "enabled" => true,
    };
    assert_eq!(f.len(), 4);
    assert_eq!(f["count"].value, Value::Int(3));
    assert_eq!(f["name"].value.as_str(), Some("web"));
    assert_eq!(f["ratio"].value.as_float(), Some(0.5));
    assert_eq!(f["enabled"].value, Value::Bool(true));
}

#[test]
fn nodes_are_marked_as_locals() {
    let f = fields! { "x" => 1_i64 };
    assert_eq!(&*f["x"].source, "locals");
    assert!(f["x"].is_resolved());
}

#[test]
fn later_keys_replace_earlier_ones() {
    let f = fields! { "x" => 1_i64, "x" => 2_i64 };
    assert_eq!(f.len(), 1);
    assert_eq!(f["x"].value.as_int(), Some(2));
}
