//! Tables file parsing, validation and CLI/YAML merging.

use sql_anonymizer::config::{AnonymizeConfig, AnonymizeYamlConfig, DbInfo};
use sql_anonymizer::spec::{FieldKind, Length, NameType, TableEntry};
use std::io::Write;
use tempfile::NamedTempFile;

const TABLES_YAML: &str = r#"
seed: 7
row_limit: 5000
schema_only:
  - SITE_ROWLOG
tables:
  AB_Profile_Email:
    email:
      - column: Email
  SITE_USER:
    username:
      - column: username
        skip: [admin]
    name:
      - column: first_name
        type: first
  AB_Item:
    text:
      - column: notes
        length: sentence
      - column: title
        length: 3
    json:
      - column: translations
        property: Description
        length: 4
  SITE_PROCESS_INSTANCE:
    truncate: true
  AB_Reminder:
"#;

fn db_info() -> DbInfo {
    DbInfo {
        source: "appbuilder".to_string(),
        target: "appbuilder_anon".to_string(),
        ..Default::default()
    }
}

#[test]
fn test_tables_keep_file_order() {
    let config = AnonymizeYamlConfig::parse(TABLES_YAML).unwrap();
    let names: Vec<&str> = config.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "AB_Profile_Email",
            "SITE_USER",
            "AB_Item",
            "SITE_PROCESS_INSTANCE",
            "AB_Reminder"
        ]
    );
    assert_eq!(config.seed, Some(7));
    assert_eq!(config.row_limit, Some(5000));
    assert_eq!(config.schema_only, vec!["SITE_ROWLOG".to_string()]);
}

#[test]
fn test_field_parameters_parsed() {
    let config = AnonymizeYamlConfig::parse(TABLES_YAML).unwrap();

    let user = config.tables.get("SITE_USER").unwrap();
    let kinds: Vec<&FieldKind> = user.groups().iter().map(|g| &g.kind).collect();
    assert_eq!(kinds, vec![&FieldKind::Username, &FieldKind::Name]);
    assert!(user.groups()[0].fields[0].skip.contains("admin"));
    assert_eq!(user.groups()[1].fields[0].name_type, Some(NameType::First));

    let item = config.tables.get("AB_Item").unwrap();
    let text = &item.groups()[0].fields;
    assert!(text[0].is_sentence());
    assert_eq!(text[1].length, Some(Length::Count(3)));
    assert_eq!(item.groups()[1].fields[0].property.as_deref(), Some("Description"));
    assert_eq!(item.columns(), vec!["notes", "title", "translations"]);
}

#[test]
fn test_truncate_and_empty_entries() {
    let config = AnonymizeYamlConfig::parse(TABLES_YAML).unwrap();

    let truncated = config.tables.get("SITE_PROCESS_INSTANCE").unwrap();
    assert!(truncated.is_truncate());
    assert!(matches!(truncated.entry, TableEntry::Truncate));

    let reminder = config.tables.get("AB_Reminder").unwrap();
    assert!(!reminder.is_truncate());
    assert!(reminder.columns().is_empty());
}

#[test]
fn test_invalid_length_rejected() {
    let yaml = "tables:\n  T:\n    text:\n      - column: c\n        length: paragraph\n";
    let err = AnonymizeYamlConfig::parse(yaml).unwrap_err();
    assert!(format!("{:#}", err).contains("paragraph"));
}

#[test]
fn test_duplicate_table_rejected() {
    let yaml = "tables:\n  T:\n    truncate: true\n  T:\n    truncate: true\n";
    assert!(AnonymizeYamlConfig::parse(yaml).is_err());
}

#[test]
fn test_validate_reports_config_mistakes() {
    let yaml = r#"
tables:
  AB_Profile:
    phone:
      - column: Phone
    numbers:
      - column: Zip
        length: sentence
    json:
      - column: translations
    email:
      - column: ""
      - column: Zip
"#;
    let config = AnonymizeYamlConfig::parse(yaml).unwrap();
    let issues = config.tables.validate();
    let messages: Vec<String> = issues.iter().map(|i| i.to_string()).collect();

    assert_eq!(issues.len(), 5, "{:#?}", messages);
    assert!(messages.iter().any(|m| m.contains("Unknown field type: phone")));
    assert!(messages.iter().any(|m| m.contains("sentence")));
    assert!(messages.iter().any(|m| m.contains("no property")));
    assert!(messages.iter().any(|m| m.contains("Empty column name")));
    assert!(messages.iter().any(|m| m == "AB_Profile.Zip: Column is declared more than once"));
}

#[test]
fn test_validate_clean_config() {
    let config = AnonymizeYamlConfig::parse(TABLES_YAML).unwrap();
    assert!(config.tables.validate().is_empty());
    assert_eq!(config.tables.field_count(), 6);
}

#[test]
fn test_builder_cli_overrides_yaml() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(TABLES_YAML.as_bytes()).unwrap();

    let config = AnonymizeConfig::builder()
        .db(db_info())
        .config_file(file.path().to_path_buf())
        .seed(Some(99))
        .row_limit(Some(0))
        .schema_only(vec!["AB_Audit".to_string()])
        .build()
        .unwrap();

    assert_eq!(config.seed, Some(99));
    assert_eq!(config.row_limit, None);
    assert_eq!(config.schema_only, vec!["AB_Audit".to_string()]);
    assert_eq!(config.tables.len(), 5);
    config.validate().unwrap();
}

#[test]
fn test_builder_falls_back_to_yaml() {
    let yaml = AnonymizeYamlConfig::parse(TABLES_YAML).unwrap();
    let config = AnonymizeConfig::builder()
        .db(db_info())
        .yaml(yaml)
        .fail_fast(true)
        .build()
        .unwrap();

    assert_eq!(config.seed, Some(7));
    assert_eq!(config.row_limit, Some(5000));
    assert_eq!(config.schema_only, vec!["SITE_ROWLOG".to_string()]);

    let options = config.pipeline_options();
    assert_eq!(options.row_limit, Some(5000));
    assert!(options.fail_fast);
}

#[test]
fn test_config_validation() {
    let yaml = AnonymizeYamlConfig::parse(TABLES_YAML).unwrap();

    let same = AnonymizeConfig::builder()
        .db(DbInfo {
            source: "appbuilder".to_string(),
            target: "appbuilder".to_string(),
            ..Default::default()
        })
        .yaml(yaml.clone())
        .build()
        .unwrap();
    assert!(same.validate().is_err());

    let in_place = AnonymizeConfig::builder()
        .db(DbInfo {
            target: "appbuilder_anon".to_string(),
            ..Default::default()
        })
        .yaml(yaml)
        .skip_clone(true)
        .build()
        .unwrap();
    in_place.validate().unwrap();

    let missing = AnonymizeConfig::builder().db(db_info()).build();
    assert!(missing.is_err());
}

#[test]
fn test_load_missing_file() {
    let err = AnonymizeYamlConfig::load(std::path::Path::new("/nonexistent/tables.yaml"))
        .unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_demo_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/tables.yaml");
    let config = AnonymizeYamlConfig::load(&path).unwrap();

    assert!(config.tables.validate().is_empty());
    assert_eq!(config.row_limit, Some(0));
    assert!(config.tables.get("AB_Feedback").unwrap().is_truncate());
    assert!(config.tables.get("AB_AccountingApp_GLSegment").unwrap().columns().is_empty());
}
