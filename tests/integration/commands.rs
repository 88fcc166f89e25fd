//! Integration tests pairing generated dump/export commands with their
//! restore/import counterparts

use suitekit_cmdline::{
    Connection, DumpOptions, DumpTarget, ExportOptions, ImportOptions, RestoreOptions, dump_commands,
    export_commands, import_command, restore_command,
};
use suitekit_core::{Platform, Port};

use crate::common::listening_port;

#[test]
fn test_dump_then_restore_collection() {
    let (_server, port) = listening_port();
    let connection = Connection::localhost(port);
    let dump = dump_commands(
        &connection,
        &DumpTarget::Collections {
            database: "testdump-3".to_string(),
            collections: vec!["testcol1".to_string()],
        },
        &DumpOptions {
            output_path: Some("data/test/dump".to_string()),
            ..DumpOptions::default()
        },
    )
    .unwrap();
    assert_eq!(
        dump,
        vec![format!(
            r#"mongodump --host "localhost" --port "{port}" --db "testdump-3" --collection "testcol1" --numParallelCollections "4" -o "data/test/dump" "#
        )]
    );

    // mongodump lays out <out>/<db>/<collection>.bson
    let restore = restore_command(
        &connection,
        "restoredump-3",
        Some("testcol1"),
        &RestoreOptions {
            drop: true,
            input_path: Some("data/test/dump/testdump-3/testcol1.bson".to_string()),
            ..RestoreOptions::default()
        },
    );
    assert_eq!(
        restore,
        format!(
            r#"mongorestore --host "localhost" --port "{port}" --db "restoredump-3" --collection "testcol1" --drop --numParallelCollections "4" --dir "data/test/dump/testdump-3/testcol1.bson" "#
        )
    );
}

#[test]
fn test_export_then_import_every_collection() {
    let connection = Connection::localhost(Port::new(32011));
    let collections = ["users", "orders"];
    let exports = export_commands(
        &connection,
        "shop",
        &collections[..],
        &ExportOptions {
            output_dir: Some("/tmp/export".to_string()),
            ..ExportOptions::default()
        },
        Platform::Unix,
    )
    .unwrap();

    for (export, collection) in exports.iter().zip(collections) {
        let file = format!("/tmp/export/{collection}.json");
        assert!(export.ends_with(&format!(r#"-o "{file}" "#)), "{export}");

        let import = import_command(
            &connection,
            "shop-copy",
            collection,
            &ImportOptions {
                input_path: Some(file.clone()),
                ..ImportOptions::default()
            },
        );
        assert_eq!(
            import,
            format!(
                r#"mongoimport --host "localhost" --port "32011" --db "shop-copy" --collection "{collection}" --file "{file}" "#
            )
        );
    }
}

#[test]
fn test_databases_dump_preserves_selection_order() {
    let lines = dump_commands(
        &Connection::new("ec2-cluster.internal", Port::new(27017)),
        &DumpTarget::Databases(vec!["zeta".to_string(), "alpha".to_string(), "mid".to_string()]),
        &DumpOptions::default(),
    )
    .unwrap();
    let order: Vec<&str> = lines
        .iter()
        .map(|line| {
            line.split(r#"--db ""#)
                .nth(1)
                .and_then(|rest| rest.split('"').next())
                .unwrap()
        })
        .collect();
    assert_eq!(order, vec!["zeta", "alpha", "mid"]);
    assert!(lines.iter().all(|l| l.starts_with(r#"mongodump --host "ec2-cluster.internal" --port "27017" "#)));
}
