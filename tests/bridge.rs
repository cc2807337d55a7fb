// Round trips through real xlsx files on disk.
// Run with: `cargo test --test bridge`

use brokergrid::bridge::{
    BridgeError, DEFAULT_SHEET_NAME, ExportSpec, ImportConfig, ImportResult, export_bytes,
    export_file, import_bytes, import_file,
};
use brokergrid::value::{Record, Value};
use chrono::{NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, PartialEq)]
struct Broker {
    id: i64,
    name: String,
    commission: f64,
    active: bool,
}

fn registered() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 6, 15)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn brokers() -> Vec<Record> {
    vec![
        Record::new()
            .with("id", 1)
            .with("name", "Альфа Брокер")
            .with("code", "007")
            .with("commission", 0.05)
            .with("active", true)
            .with("registered", registered()),
        Record::new()
            .with("id", 2)
            .with("name", "Бета Инвест")
            .with("code", "042")
            .with("commission", 0.1)
            .with("active", false)
            .with("registered", registered()),
    ]
}

fn broker_shape(b: &Broker) -> Record {
    Record::new()
        .with("id", b.id)
        .with("name", b.name.as_str())
        .with("commission", b.commission)
        .with("active", b.active)
}

fn to_brokers(rows: Vec<Record>) -> Result<Vec<Broker>, String> {
    rows.into_iter()
        .enumerate()
        .map(|(idx, r)| {
            Ok(Broker {
                id: r
                    .value("id")
                    .as_f64()
                    .ok_or_else(|| format!("row {}: id is not a number", idx + 2))?
                    as i64,
                name: r.value("name").to_string(),
                commission: r.value("commission").as_f64().unwrap_or_default(),
                active: r.value("active").as_bool().unwrap_or_default(),
            })
        })
        .collect()
}

#[tokio::test]
async fn file_round_trip_keeps_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = export_file(&brokers(), &ExportSpec::new("brokers"), dir.path()).unwrap();
    assert_eq!(path, dir.path().join("brokers.xlsx"));

    let result = import_file(&path, &ImportConfig::new()).await;
    let rows = result.into_data().expect("import succeeds");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].value("name"), Value::from("Альфа Брокер"));
    assert_eq!(rows[0].value("code"), Value::from("007"));
    assert_eq!(rows[0].value("id"), Value::Number(1.0));
    assert_eq!(rows[1].value("commission"), Value::Number(0.1));
    assert_eq!(rows[1].value("active"), Value::Bool(false));
    assert_eq!(rows[0].value("registered"), Value::Date(registered()));
}

#[test]
fn typed_round_trip_through_shape_and_transform() {
    let typed = vec![
        Broker {
            id: 10,
            name: "Гамма".into(),
            commission: 0.25,
            active: true,
        },
        Broker {
            id: 11,
            name: "Дельта".into(),
            commission: 0.0,
            active: false,
        },
    ];
    let bytes = export_bytes(&typed, &ExportSpec::shaped("typed", broker_shape)).unwrap();

    let config = ImportConfig::new().transform_data(to_brokers);
    let back = import_bytes(bytes, &config).into_data().unwrap();
    assert_eq!(back, typed);
}

#[test]
fn missing_sheet_is_rejected() {
    let bytes = export_bytes(&brokers(), &ExportSpec::new("b")).unwrap();
    let result = import_bytes(bytes, &ImportConfig::new().sheet_name("Брокеры"));
    assert!(!result.is_imported());
    assert_eq!(
        result.error_message().as_deref(),
        Some("Sheet \"Брокеры\" not found")
    );
}

#[test]
fn named_sheet_is_read() {
    let spec = ExportSpec::new("b").sheet_name("Брокеры");
    let bytes = export_bytes(&brokers(), &spec).unwrap();
    let rows = import_bytes(bytes, &ImportConfig::new().sheet_name("Брокеры"))
        .into_data()
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn validation_failure_returns_raw_rows() {
    let bytes = export_bytes(&brokers(), &ExportSpec::new("b")).unwrap();
    let config = ImportConfig::new()
        .validate_data(|rows| {
            rows.iter()
                .enumerate()
                .filter(|(_, r)| r.value("active") == Value::Bool(false))
                .map(|(idx, _)| format!("row {}: broker is inactive", idx + 2))
                .collect()
        })
        .transform_data(to_brokers);

    match import_bytes(bytes, &config) {
        ImportResult::Rejected { raw, errors } => {
            assert_eq!(raw.len(), 2);
            assert_eq!(raw[1].value("name"), Value::from("Бета Инвест"));
            assert_eq!(errors, vec!["row 3: broker is inactive".to_string()]);
        }
        ImportResult::Imported(_) => panic!("validation should reject"),
    }
}

#[test]
fn transform_error_is_rejected_without_raw_rows() {
    let bytes = export_bytes(&brokers(), &ExportSpec::new("b")).unwrap();
    let config = ImportConfig::new().transform_data(|_| Err::<Vec<Broker>, _>("boom".to_string()));
    assert_eq!(
        import_bytes(bytes, &config),
        ImportResult::Rejected {
            raw: Vec::new(),
            errors: vec!["boom".to_string()],
        }
    );
}

#[test]
fn start_row_zero_includes_header_row() {
    let bytes = export_bytes(&brokers(), &ExportSpec::new("b")).unwrap();
    let rows = import_bytes(bytes, &ImportConfig::new().start_row(0))
        .into_data()
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].value("name"), Value::from("name"));
}

#[test]
fn union_of_keys_becomes_header() {
    let records = vec![
        Record::new().with("id", 1).with("name", "Альфа"),
        Record::new().with("id", 2).with("city", "Казань"),
    ];
    let bytes = export_bytes(&records, &ExportSpec::new("u")).unwrap();
    let rows = import_bytes(bytes, &ImportConfig::new()).into_data().unwrap();

    assert_eq!(
        rows[0].keys().collect::<Vec<_>>(),
        vec!["id", "name", "city"]
    );
    assert_eq!(rows[0].value("city"), Value::from(""));
    assert_eq!(rows[1].value("name"), Value::from(""));
    assert_eq!(rows[1].value("city"), Value::from("Казань"));
}

#[test]
fn default_sheet_is_named_data() {
    let bytes = export_bytes(&brokers(), &ExportSpec::new("b")).unwrap();
    let rows = import_bytes(bytes, &ImportConfig::new().sheet_name(DEFAULT_SHEET_NAME))
        .into_data()
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn invalid_sheet_name_fails_export() {
    let spec = ExportSpec::new("b").sheet_name("x".repeat(40));
    assert!(matches!(
        export_bytes(&brokers(), &spec),
        Err(BridgeError::InvalidSheetName { .. })
    ));
}

#[test]
fn export_into_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    let err = export_file(&brokers(), &ExportSpec::new("b"), &missing).unwrap_err();
    match err {
        BridgeError::Write { path, .. } => assert_eq!(path, missing.join("b.xlsx")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn malformed_bytes_never_raise() {
    let result = import_bytes(b"not a workbook".to_vec(), &ImportConfig::new());
    assert!(!result.is_imported());
    assert_eq!(result.errors().len(), 1);
}

#[tokio::test]
async fn missing_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let result = import_file(dir.path().join("absent.xlsx"), &ImportConfig::new()).await;
    let message = result.error_message().unwrap();
    assert!(message.starts_with("Failed to read"), "{message}");
}
