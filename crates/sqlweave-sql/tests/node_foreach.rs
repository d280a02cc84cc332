use indexmap::IndexMap;
use sqlweave_core::meta::Navigator;
use sqlweave_core::{ErrorKind, ShapeRegistry, Type, Value};
use sqlweave_sql::{DynamicSqlSource, ForEachNode, SqlNode, SqlSource, TestExpr};

fn map(entries: &[(&str, Value)]) -> Value {
    Value::Map(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<IndexMap<_, _>>(),
    )
}

fn in_clause_source() -> SqlSource {
    let body = SqlNode::mixed(vec![
        SqlNode::static_text("SELECT * FROM t WHERE id IN "),
        SqlNode::ForEach(ForEachNode::new(
            TestExpr::parse("ids").unwrap(),
            "i",
            None,
            "(",
            ")",
            ",",
            SqlNode::static_text("#{i}"),
        )),
    ]);
    SqlSource::Dynamic(DynamicSqlSource {
        root: body,
        param_ty: Type::Map,
    })
}

#[test]
fn expands_one_placeholder_per_element() {
    let registry = ShapeRegistry::new();
    let param = map(&[(
        "ids",
        Value::List(vec![Value::I64(3), Value::I64(4), Value::I64(5)]),
    )]);
    let bound = in_clause_source().bind(&param, &registry).unwrap();
    assert_eq!(bound.sql, "SELECT * FROM t WHERE id IN (?,?,?)");
    assert_eq!(bound.descriptors.len(), 3);

    let navigator = Navigator::new(&registry);
    let values: Vec<Value> = bound
        .descriptors
        .iter()
        .map(|d| bound.resolve_value(&navigator, &param, &d.property).unwrap())
        .collect();
    assert_eq!(values, vec![Value::I64(3), Value::I64(4), Value::I64(5)]);
}

#[test]
fn empty_collection_emits_open_and_close_only() {
    let registry = ShapeRegistry::new();
    let param = map(&[("ids", Value::List(vec![]))]);
    let bound = in_clause_source().bind(&param, &registry).unwrap();
    assert_eq!(bound.sql, "SELECT * FROM t WHERE id IN ()");
    assert!(bound.descriptors.is_empty());
}

#[test]
fn null_collection_fails() {
    let registry = ShapeRegistry::new();
    let param = map(&[("ids", Value::Null)]);
    let err = in_clause_source().bind(&param, &registry).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Binding);
}

#[test]
fn map_iteration_binds_key_as_index() {
    let registry = ShapeRegistry::new();
    let mut entries = IndexMap::new();
    entries.insert("a".to_string(), Value::I64(1));
    entries.insert("b".to_string(), Value::I64(2));
    let param = map(&[("cols", Value::Map(entries))]);

    let source = SqlSource::Dynamic(DynamicSqlSource {
        root: SqlNode::ForEach(ForEachNode::new(
            TestExpr::parse("cols").unwrap(),
            "v",
            Some("k".to_string()),
            "",
            "",
            ", ",
            SqlNode::Text(sqlweave_sql::TextNode::new("${k} = #{v}")),
        )),
        param_ty: Type::Map,
    });
    let bound = source.bind(&param, &registry).unwrap();
    assert_eq!(bound.sql, "a = ?, b = ?");

    let navigator = Navigator::new(&registry);
    let first = bound
        .resolve_value(&navigator, &param, &bound.descriptors[0].property)
        .unwrap();
    assert_eq!(first, Value::I64(1));
}

#[test]
fn nested_item_paths_resolve_per_iteration() {
    let registry = ShapeRegistry::new();
    let users = Value::List(vec![
        map(&[("id", Value::I64(10))]),
        map(&[("id", Value::I64(20))]),
    ]);
    let param = map(&[("users", users)]);

    let source = SqlSource::Dynamic(DynamicSqlSource {
        root: SqlNode::ForEach(ForEachNode::new(
            TestExpr::parse("users").unwrap(),
            "u",
            None,
            "(",
            ")",
            ",",
            SqlNode::static_text("#{u.id}"),
        )),
        param_ty: Type::Map,
    });
    let bound = source.bind(&param, &registry).unwrap();
    assert_eq!(bound.sql, "(?,?)");

    let navigator = Navigator::new(&registry);
    let values: Vec<Value> = bound
        .descriptors
        .iter()
        .map(|d| bound.resolve_value(&navigator, &param, &d.property).unwrap())
        .collect();
    assert_eq!(values, vec![Value::I64(10), Value::I64(20)]);
}

#[test]
fn iteration_variables_do_not_leak() {
    let registry = ShapeRegistry::new();
    let body = SqlNode::mixed(vec![
        SqlNode::ForEach(ForEachNode::new(
            TestExpr::parse("ids").unwrap(),
            "i",
            None,
            "(",
            ")",
            ",",
            SqlNode::static_text("#{i}"),
        )),
        // After the loop, `i` must fall through to the parameter object.
        SqlNode::Text(sqlweave_sql::TextNode::new(" /* ${i} */")),
    ]);
    let param = map(&[
        ("ids", Value::List(vec![Value::I64(1)])),
        ("i", Value::string("outer")),
    ]);
    let source = SqlSource::Dynamic(DynamicSqlSource {
        root: body,
        param_ty: Type::Map,
    });
    let bound = source.bind(&param, &registry).unwrap();
    assert_eq!(bound.sql, "(?) /* outer */");
}
