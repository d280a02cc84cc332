use indexmap::IndexMap;
use sqlweave_core::meta::Navigator;
use sqlweave_core::{ShapeRegistry, Type, Value};
use sqlweave_sql::{
    BindNode, ChooseNode, DynamicSqlSource, SetNode, SqlNode, SqlSource, StaticSqlSource,
    TestExpr, TrimNode,
};

fn map(entries: &[(&str, Value)]) -> Value {
    Value::Map(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<IndexMap<_, _>>(),
    )
}

#[test]
fn static_statement_compiles_once() {
    let registry = ShapeRegistry::new();
    let source = SqlSource::Static(
        StaticSqlSource::compile("SELECT id FROM t WHERE id = #{id}", &Type::Map, &registry)
            .unwrap(),
    );
    let param = map(&[("id", Value::I64(7))]);
    let bound = source.bind(&param, &registry).unwrap();
    assert_eq!(bound.sql, "SELECT id FROM t WHERE id = ?");

    let navigator = Navigator::new(&registry);
    let value = bound
        .resolve_value(&navigator, &param, &bound.descriptors[0].property)
        .unwrap();
    assert_eq!(value, Value::I64(7));
}

#[test]
fn evaluation_is_deterministic() {
    let registry = ShapeRegistry::new();
    let source = SqlSource::Dynamic(DynamicSqlSource {
        root: SqlNode::mixed(vec![
            SqlNode::static_text("UPDATE t "),
            SqlNode::Set(SetNode::new(SqlNode::static_text("a = #{a}, b = #{b},"))),
            SqlNode::static_text(" WHERE id = #{id}"),
        ]),
        param_ty: Type::Map,
    });
    let param = map(&[
        ("a", Value::I64(1)),
        ("b", Value::string("x")),
        ("id", Value::I64(9)),
    ]);

    let first = source.bind(&param, &registry).unwrap();
    let second = source.bind(&param, &registry).unwrap();
    assert_eq!(first.sql, second.sql);
    assert_eq!(first.descriptors, second.descriptors);
    assert_eq!(first.sql, "UPDATE t SET a = ?, b = ? WHERE id = ?");
}

#[test]
fn choose_takes_first_truthy_branch() {
    let registry = ShapeRegistry::new();
    let choose = ChooseNode::new(
        vec![
            (
                TestExpr::parse("a != null").unwrap(),
                SqlNode::static_text("BY_A"),
            ),
            (
                TestExpr::parse("b != null").unwrap(),
                SqlNode::static_text("BY_B"),
            ),
        ],
        Some(SqlNode::static_text("BY_DEFAULT")),
    );
    let source = SqlSource::Dynamic(DynamicSqlSource {
        root: SqlNode::Choose(choose),
        param_ty: Type::Map,
    });

    let bound = source
        .bind(&map(&[("a", Value::I64(1)), ("b", Value::I64(2))]), &registry)
        .unwrap();
    assert_eq!(bound.sql, "BY_A");

    let bound = source
        .bind(&map(&[("b", Value::I64(2))]), &registry)
        .unwrap();
    assert_eq!(bound.sql, "BY_B");

    let bound = source.bind(&map(&[]), &registry).unwrap();
    assert_eq!(bound.sql, "BY_DEFAULT");
}

#[test]
fn trim_applies_prefix_and_strips_overrides() {
    let registry = ShapeRegistry::new();
    let trim = TrimNode::new(
        Some("(".to_string()),
        Some(")".to_string()),
        vec!["AND ".to_string()],
        vec![",".to_string()],
        SqlNode::static_text("AND x = #{x},"),
    );
    let source = SqlSource::Dynamic(DynamicSqlSource {
        root: SqlNode::Trim(trim),
        param_ty: Type::Map,
    });
    let bound = source.bind(&map(&[("x", Value::I64(1))]), &registry).unwrap();
    assert_eq!(bound.sql, "( x = ? )");
}

#[test]
fn bind_value_is_visible_to_text_and_binder() {
    let registry = ShapeRegistry::new();
    let source = SqlSource::Dynamic(DynamicSqlSource {
        root: SqlNode::mixed(vec![
            SqlNode::Bind(BindNode::new(
                "key",
                TestExpr::parse("name").unwrap(),
            )),
            SqlNode::static_text("WHERE name = #{key}"),
        ]),
        param_ty: Type::Map,
    });
    let param = map(&[("name", Value::string("John"))]);
    let bound = source.bind(&param, &registry).unwrap();
    assert_eq!(bound.sql, "WHERE name = ?");

    let navigator = Navigator::new(&registry);
    let value = bound
        .resolve_value(&navigator, &param, &bound.descriptors[0].property)
        .unwrap();
    assert_eq!(value, Value::string("John"));
}

#[test]
fn binding_parity_for_dynamic_sources() {
    let registry = ShapeRegistry::new();
    let source = SqlSource::Dynamic(DynamicSqlSource {
        root: SqlNode::mixed(vec![
            SqlNode::static_text("INSERT INTO t VALUES (#{a}, #{b})"),
        ]),
        param_ty: Type::Map,
    });
    let bound = source
        .bind(&map(&[("a", Value::I64(1)), ("b", Value::I64(2))]), &registry)
        .unwrap();
    assert_eq!(bound.sql.matches('?').count(), bound.descriptors.len());
}
