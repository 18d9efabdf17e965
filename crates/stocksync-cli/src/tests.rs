use chrono::Utc;
use stocksync_core::{OutOfStockAction, SupplierSyncConfig};
use stocksync_engine::actions::{StatusResponse, SyncAllResponse};
use stocksync_engine::{ActionResponse, SyncRunResult};

use super::*;

const USER: &str = "0b9d7c1e-2f3a-4c5d-8e6f-7a8b9c0d1e2f";

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["stocksync-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["stocksync-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn sync_all_requires_a_user() {
    assert!(Cli::try_parse_from(["stocksync-cli", "sync", "all"]).is_err());

    let cli = Cli::try_parse_from(["stocksync-cli", "sync", "all", "--user", USER])
        .expect("expected valid cli args");
    match cli.command {
        Some(Commands::Sync {
            command: SyncCommands::All { user, json },
        }) => {
            assert_eq!(user.to_string(), USER);
            assert!(!json);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn user_must_be_a_uuid() {
    assert!(Cli::try_parse_from(["stocksync-cli", "status", "--user", "alice"]).is_err());
}

#[test]
fn config_update_parses_optional_fields() {
    let config_id = Uuid::new_v4().to_string();
    let cli = Cli::try_parse_from([
        "stocksync-cli",
        "config",
        "update",
        "--user",
        USER,
        "--config",
        &config_id,
        "--frequency",
        "30",
        "--out-of-stock-action",
        "hide",
    ])
    .expect("expected valid cli args");

    let Some(Commands::Config {
        command:
            ConfigCommands::Update {
                enabled,
                frequency,
                threshold,
                out_of_stock_action,
                ..
            },
    }) = cli.command
    else {
        panic!("expected config update");
    };
    assert_eq!(enabled, None);
    assert_eq!(frequency, Some(30.0));
    assert_eq!(threshold, None);
    assert_eq!(out_of_stock_action.as_deref(), Some("hide"));
}

#[test]
fn update_request_carries_only_given_fields() {
    let config_id = Uuid::new_v4();
    let request = sync::update_config_request(config_id, Some(false), None, Some(3.0), None);
    assert_eq!(request.action, "update_config");
    assert_eq!(request.config_id, Some(config_id.to_string()));
    assert_eq!(request.sync_enabled, Some(false));
    assert_eq!(request.sync_frequency_minutes, None);
    assert_eq!(request.low_stock_threshold, Some(3.0));
}

#[test]
fn summary_lists_each_supplier_run() {
    let response = ActionResponse::SyncAll(SyncAllResponse {
        success: true,
        synced_suppliers: 1,
        results: vec![SyncRunResult {
            config_id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            supplier_name: Some("VidaXL".to_string()),
            products_checked: 4,
            products_updated: 2,
            products_failed: 1,
            low_stock_detected: 1,
            out_of_stock_detected: 0,
            alerts_created: 1,
            alerts_resolved: 0,
            error: Some("1 of 4 products failed; first error: boom".to_string()),
        }],
    });

    let lines = sync::summarize(&response);
    assert_eq!(lines[0], "synced suppliers: 1");
    assert!(lines[2].starts_with("VidaXL"));
    assert!(lines[2].ends_with("first error: boom"));
}

#[test]
fn empty_status_says_so() {
    let response = ActionResponse::Status(StatusResponse {
        success: true,
        configs: Vec::new(),
    });
    assert_eq!(sync::summarize(&response), vec!["no sync configs".to_string()]);
}

#[test]
fn status_summary_shows_never_for_unsynced_configs() {
    let config = SupplierSyncConfig {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        supplier_id: Uuid::new_v4(),
        supplier_name: Some("Matterhorn".to_string()),
        connector_type: Some("matterhorn".to_string()),
        sync_enabled: true,
        sync_frequency_minutes: 60,
        low_stock_threshold: 10,
        out_of_stock_action: OutOfStockAction::Flag,
        last_sync_at: None,
        next_sync_at: Utc::now(),
        total_syncs: 0,
        failed_syncs: 0,
        last_error: None,
    };
    let response = ActionResponse::Status(StatusResponse {
        success: true,
        configs: vec![config.into()],
    });
    let lines = sync::summarize(&response);
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("never"));
}
