mod common;

use common::{map, Reply, StubConnection};
use sqlweave::{CatalogBuilder, SessionFactory, Shape, Type, Value};

fn person_factory() -> SessionFactory {
    let mut builder = CatalogBuilder::new();
    builder.register_shape(
        Shape::new("Person")
            .property("id", Type::I64)
            .property("name", Type::String)
            .property("userName", Type::String),
    );
    builder
        .mapper_xml(
            r#"<mapper namespace="person">
                 <resultMap id="personMap" type="Person">
                   <id property="id" column="id"/>
                   <result property="name" column="name"/>
                 </resultMap>
                 <select id="findById" parameterType="map" resultMap="personMap">SELECT id, name FROM person WHERE id = #{id}</select>
                 <select id="search" parameterType="map" resultMap="personMap">SELECT id, name FROM person <where><if test="a != null">AND a = #{a}</if><if test="b != null">AND b = #{b}</if></where></select>
                 <select id="findRaw" resultType="map">SELECT id, user_name FROM person</select>
                 <select id="findCamel" resultType="Person">SELECT id, user_name FROM person</select>
                 <insert id="create" parameterType="map" useGeneratedKeys="true" keyProperty="id">INSERT INTO person (name) VALUES (#{name})</insert>
               </mapper>"#,
        )
        .unwrap();
    builder
        .settings_mut()
        .set("mapUnderscoreToCamelCase", "true")
        .unwrap();
    SessionFactory::new(builder.build().unwrap())
}

#[test]
fn static_select_binds_and_maps() {
    let factory = person_factory();
    let (conn, handle) = StubConnection::new();
    handle.enqueue(Reply::Rows {
        columns: vec!["id", "name"],
        rows: vec![vec![Value::I64(7), Value::string("John")]],
    });
    let session = factory.open_session(conn);

    let person = session
        .select_one("person.findById", &map(&[("id", Value::I64(7))]))
        .unwrap();

    assert_eq!(handle.last_sql(), "SELECT id, name FROM person WHERE id = ?");
    assert_eq!(handle.last_binds(), vec![Value::I64(7)]);

    let object = person.as_struct().unwrap();
    assert_eq!(object.shape, "Person");
    assert_eq!(object.get("id"), Some(&Value::I64(7)));
    assert_eq!(object.get("name"), Some(&Value::string("John")));
}

#[test]
fn dynamic_where_drives_the_final_sql() {
    let factory = person_factory();
    let (conn, handle) = StubConnection::new();
    handle.enqueue(Reply::Rows {
        columns: vec!["id", "name"],
        rows: vec![],
    });
    let session = factory.open_session(conn);

    session
        .select_list(
            "person.search",
            &map(&[("a", Value::I64(1)), ("b", Value::Null)]),
        )
        .unwrap();
    assert_eq!(
        handle.last_sql(),
        "SELECT id, name FROM person WHERE a = ?"
    );
    assert_eq!(handle.last_binds(), vec![Value::I64(1)]);
}

#[test]
fn result_type_map_collects_all_columns() {
    let factory = person_factory();
    let (conn, handle) = StubConnection::new();
    handle.enqueue(Reply::Rows {
        columns: vec!["id", "user_name"],
        rows: vec![vec![Value::I64(1), Value::string("jdoe")]],
    });
    let session = factory.open_session(conn);

    let row = session.select_one("person.findRaw", &Value::Null).unwrap();
    let entries = row.as_map().unwrap();
    assert_eq!(entries.get("id"), Some(&Value::I64(1)));
    assert_eq!(entries.get("user_name"), Some(&Value::string("jdoe")));
}

#[test]
fn underscore_columns_auto_map_to_camel_case_properties() {
    let factory = person_factory();
    let (conn, handle) = StubConnection::new();
    handle.enqueue(Reply::Rows {
        columns: vec!["id", "user_name"],
        rows: vec![vec![Value::I64(1), Value::string("jdoe")]],
    });
    let session = factory.open_session(conn);

    let person = session.select_one("person.findCamel", &Value::Null).unwrap();
    let object = person.as_struct().unwrap();
    assert_eq!(object.get("id"), Some(&Value::I64(1)));
    assert_eq!(object.get("userName"), Some(&Value::string("jdoe")));
}

#[test]
fn all_null_row_maps_to_null() {
    let factory = person_factory();
    let (conn, handle) = StubConnection::new();
    handle.enqueue(Reply::Rows {
        columns: vec!["id", "name"],
        rows: vec![vec![Value::Null, Value::Null]],
    });
    let session = factory.open_session(conn);

    let person = session
        .select_one("person.findById", &map(&[("id", Value::I64(1))]))
        .unwrap();
    assert!(person.is_null());
}

#[test]
fn generated_key_is_written_back() {
    let factory = person_factory();
    let (conn, handle) = StubConnection::new();
    handle.enqueue(Reply::CountWithKey(1, Value::I64(42)));
    let session = factory.open_session(conn);

    let mut param = map(&[("name", Value::string("Ada"))]);
    let count = session.insert("person.create", &mut param).unwrap();
    assert_eq!(count, 1);
    assert_eq!(handle.last_binds(), vec![Value::string("Ada")]);
    assert_eq!(
        param.as_map().unwrap().get("id"),
        Some(&Value::I64(42))
    );
}

#[test]
fn constructor_mappings_populate_read_only_properties() {
    let mut builder = CatalogBuilder::new();
    builder.register_shape(
        Shape::new("Point")
            .read_only("x", Type::I64)
            .read_only("y", Type::I64),
    );
    builder
        .mapper_xml(
            r#"<mapper namespace="geo">
                 <resultMap id="pointMap" type="Point">
                   <constructor><idArg name="x" column="x"/><arg name="y" column="y"/></constructor>
                 </resultMap>
                 <select id="origin" resultMap="pointMap">SELECT x, y FROM points</select>
               </mapper>"#,
        )
        .unwrap();
    let factory = SessionFactory::new(builder.build().unwrap());

    let (conn, handle) = StubConnection::new();
    handle.enqueue(Reply::Rows {
        columns: vec!["x", "y"],
        rows: vec![vec![Value::I64(3), Value::I64(4)]],
    });
    let session = factory.open_session(conn);

    let point = session.select_one("geo.origin", &Value::Null).unwrap();
    let object = point.as_struct().unwrap();
    assert_eq!(object.get("x"), Some(&Value::I64(3)));
    assert_eq!(object.get("y"), Some(&Value::I64(4)));
}

#[test]
fn discriminator_switches_the_result_map() {
    let mut builder = CatalogBuilder::new();
    builder.register_shape(
        Shape::new("Vehicle")
            .property("id", Type::I64)
            .property("kind", Type::String)
            .property("doors", Type::I64),
    );
    builder
        .mapper_xml(
            r#"<mapper namespace="garage">
                 <resultMap id="vehicle" type="Vehicle">
                   <id property="id" column="id"/>
                   <result property="kind" column="kind"/>
                   <discriminator column="kind">
                     <case value="car" resultMap="car"/>
                   </discriminator>
                 </resultMap>
                 <resultMap id="car" type="Vehicle" extends="vehicle">
                   <result property="doors" column="doors"/>
                 </resultMap>
                 <select id="findAll" resultMap="vehicle">SELECT id, kind, doors FROM vehicle</select>
               </mapper>"#,
        )
        .unwrap();
    let factory = SessionFactory::new(builder.build().unwrap());

    let (conn, handle) = StubConnection::new();
    handle.enqueue(Reply::Rows {
        columns: vec!["id", "kind", "doors"],
        rows: vec![
            vec![Value::I64(1), Value::string("car"), Value::I64(4)],
            vec![Value::I64(2), Value::string("bike"), Value::Null],
        ],
    });
    let session = factory.open_session(conn);

    let rows = session.select_list("garage.findAll", &Value::Null).unwrap();
    assert_eq!(rows.len(), 2);

    let car = rows[0].as_struct().unwrap();
    assert_eq!(car.get("doors"), Some(&Value::I64(4)));

    let bike = rows[1].as_struct().unwrap();
    assert_eq!(bike.get("kind"), Some(&Value::string("bike")));
    assert_eq!(bike.get("doors"), Some(&Value::Null));
}
