//! The facade end to end: config file, connect, store

use quarry::{connect_file, record, Catalog, Criteria, DataType, FindOptions, Schema, Sort, Value};
use std::io::Write;

#[tokio::test]
async fn config_file_to_query() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quarry.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[database]\nengine = \"memory\"").unwrap();

    let db = connect_file(&path).await.unwrap();
    let catalog = Catalog::with_db(db);
    let schema = Schema::builder()
        .primary("id", DataType::U32)
        .field("name", DataType::String)
        .optional("rank", DataType::I16)
        .build("players")
        .unwrap();
    let players = catalog.store("players", schema).unwrap();
    players.create_schema().await.unwrap();

    for (name, rank) in [("a", -2i16), ("b", 5), ("c", 0)] {
        players
            .insert(record! { "name" => name, "rank" => rank })
            .await
            .unwrap();
    }
    let rows = players
        .find(
            FindOptions::new()
                .filter(Criteria::new().op("rank", quarry::Operator::Lte, 0i16))
                .sort(Sort::new().desc("rank")),
        )
        .await
        .unwrap();
    let names: Vec<_> = rows.iter().filter_map(|r| r.get("name")).collect();
    assert_eq!(names, [&Value::from("c"), &Value::from("a")]);
}
