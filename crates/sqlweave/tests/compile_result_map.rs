use sqlweave::{CatalogBuilder, ErrorKind, Shape, Type};

fn people_shapes(builder: &mut CatalogBuilder) {
    builder.register_shape(
        Shape::new("Person")
            .property("id", Type::I64)
            .property("name", Type::String)
            .property("email", Type::String),
    );
}

#[test]
fn extends_merges_parent_mappings() {
    let mut builder = CatalogBuilder::new();
    people_shapes(&mut builder);
    builder
        .mapper_xml(
            r#"<mapper namespace="people">
                 <resultMap id="base" type="Person">
                   <id property="id" column="id"/>
                   <result property="name" column="name"/>
                 </resultMap>
                 <resultMap id="detailed" type="Person" extends="base">
                   <result property="email" column="email"/>
                 </resultMap>
                 <select id="find" resultMap="detailed">SELECT 1</select>
               </mapper>"#,
        )
        .unwrap();
    let catalog = builder.build().unwrap();
    let map = catalog.result_map("people.detailed").unwrap();

    let mut properties: Vec<(&str, Option<&str>)> = map
        .mappings
        .iter()
        .map(|m| (m.property.as_str(), m.column.as_deref()))
        .collect();
    properties.sort();
    assert_eq!(
        properties,
        vec![
            ("email", Some("email")),
            ("id", Some("id")),
            ("name", Some("name"))
        ]
    );
    assert!(map.mappings.iter().any(|m| m.id && m.property == "id"));
}

#[test]
fn child_override_replaces_parent_tuple() {
    let mut builder = CatalogBuilder::new();
    people_shapes(&mut builder);
    builder
        .mapper_xml(
            r#"<mapper namespace="people">
                 <resultMap id="base" type="Person">
                   <result property="name" column="name"/>
                 </resultMap>
                 <resultMap id="loud" type="Person" extends="base">
                   <result property="name" column="name" javaType="string"/>
                 </resultMap>
                 <select id="find" resultMap="loud">SELECT 1</select>
               </mapper>"#,
        )
        .unwrap();
    let catalog = builder.build().unwrap();
    let map = catalog.result_map("people.loud").unwrap();
    let name_mappings: Vec<_> = map
        .mappings
        .iter()
        .filter(|m| m.property == "name")
        .collect();
    assert_eq!(name_mappings.len(), 1);
    assert_eq!(name_mappings[0].app_ty, Some(Type::String));
}

#[test]
fn child_constructor_drops_parent_constructor() {
    let mut builder = CatalogBuilder::new();
    builder.register_shape(
        Shape::new("Point")
            .read_only("x", Type::I64)
            .read_only("y", Type::I64),
    );
    builder
        .mapper_xml(
            r#"<mapper namespace="geo">
                 <resultMap id="base" type="Point">
                   <constructor><idArg name="x" column="old_x"/></constructor>
                 </resultMap>
                 <resultMap id="flipped" type="Point" extends="base">
                   <constructor><idArg name="y" column="y"/></constructor>
                 </resultMap>
                 <resultMap id="plain" type="Point" extends="base"/>
                 <select id="find" resultMap="flipped">SELECT 1</select>
                 <select id="findPlain" resultMap="plain">SELECT 1</select>
               </mapper>"#,
        )
        .unwrap();
    let catalog = builder.build().unwrap();

    let flipped = catalog.result_map("geo.flipped").unwrap();
    assert_eq!(flipped.constructor.len(), 1);
    assert_eq!(flipped.constructor[0].property, "y");

    // A child without constructor mappings inherits the parent's.
    let plain = catalog.result_map("geo.plain").unwrap();
    assert_eq!(plain.constructor.len(), 1);
    assert_eq!(plain.constructor[0].property, "x");
}

#[test]
fn cyclic_extends_fails() {
    let mut builder = CatalogBuilder::new();
    people_shapes(&mut builder);
    builder
        .mapper_xml(
            r#"<mapper namespace="people">
                 <resultMap id="a" type="Person" extends="b"><result property="id" column="id"/></resultMap>
                 <resultMap id="b" type="Person" extends="a"><result property="name" column="name"/></resultMap>
               </mapper>"#,
        )
        .unwrap();
    let err = builder.build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CyclicResultMapExtension);
}

#[test]
fn select_requires_a_result_map() {
    let mut builder = CatalogBuilder::new();
    builder
        .mapper_xml(r#"<mapper namespace="a"><select id="find">SELECT 1</select></mapper>"#)
        .unwrap();
    let err = builder.build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn non_select_must_not_declare_a_result_map() {
    let mut builder = CatalogBuilder::new();
    people_shapes(&mut builder);
    builder
        .mapper_xml(
            r#"<mapper namespace="a">
                 <resultMap id="m" type="Person"><result property="id" column="id"/></resultMap>
                 <update id="up" resultMap="m">UPDATE t SET x = 1</update>
               </mapper>"#,
        )
        .unwrap();
    let err = builder.build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn database_id_selects_the_dialect_variant() {
    let mapper = r#"<mapper namespace="a">
        <select id="now" resultType="map" databaseId="mysql">SELECT NOW()</select>
        <select id="now" resultType="map">SELECT CURRENT_TIMESTAMP</select>
    </mapper>"#;

    let mut tagged = CatalogBuilder::new();
    tagged.database_id("mysql");
    tagged.mapper_xml(mapper).unwrap();
    let catalog = tagged.build().unwrap();
    match &catalog.statement("a.now").unwrap().source {
        sqlweave::sql::SqlSource::Static(s) => assert_eq!(s.sql, "SELECT NOW()"),
        _ => panic!("expected static source"),
    }

    let mut untagged = CatalogBuilder::new();
    untagged.mapper_xml(mapper).unwrap();
    let catalog = untagged.build().unwrap();
    match &catalog.statement("a.now").unwrap().source {
        sqlweave::sql::SqlSource::Static(s) => assert_eq!(s.sql, "SELECT CURRENT_TIMESTAMP"),
        _ => panic!("expected static source"),
    }
}

#[test]
fn unknown_configuration_setting_fails_bootstrap() {
    let mut builder = CatalogBuilder::new();
    let err = builder
        .configuration_xml(
            r#"<configuration><settings><setting name="frobnicate" value="true"/></settings></configuration>"#,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn configuration_applies_settings_and_environment() {
    let mut builder = CatalogBuilder::new();
    builder
        .configuration_xml(
            r#"<configuration>
                 <settings>
                   <setting name="mapUnderscoreToCamelCase" value="true"/>
                   <setting name="cacheEnabled" value="false"/>
                 </settings>
                 <environments default="staging"/>
               </configuration>"#,
        )
        .unwrap();
    let catalog = builder.build().unwrap();
    assert!(catalog.settings.map_underscore_to_camel_case);
    assert!(!catalog.settings.cache_enabled);
    assert_eq!(catalog.environment, "staging");
}

#[test]
fn duplicate_statement_fails() {
    let mut builder = CatalogBuilder::new();
    builder
        .mapper_xml(
            r#"<mapper namespace="a">
                 <select id="find" resultType="map">SELECT 1</select>
                 <select id="find" resultType="map">SELECT 2</select>
               </mapper>"#,
        )
        .unwrap();
    let err = builder.build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}
