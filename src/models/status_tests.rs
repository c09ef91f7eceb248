use super::*;

#[test]
fn test_active_powered_on_is_running() {
    let state = project_instance_state(ServiceStatus::Active, Some(&RunState::PoweredOn));
    assert_eq!(state, InstanceState::Running);
    assert_eq!(state.code(), 16);
}

#[test]
fn test_active_powered_off_is_stopped() {
    let state = project_instance_state(ServiceStatus::Active, Some(&RunState::PoweredOff));
    assert_eq!(state, InstanceState::Stopped);
    assert_eq!(state.code(), 80);
}

#[test]
fn test_active_updating_runstate_is_building() {
    let state = project_instance_state(ServiceStatus::Active, Some(&RunState::Update));
    assert_eq!(state, InstanceState::Building);
}

#[test]
fn test_active_without_runstate_is_unknown() {
    assert_eq!(
        project_instance_state(ServiceStatus::Active, None),
        InstanceState::Unknown
    );
    assert_eq!(
        project_instance_state(
            ServiceStatus::Active,
            Some(&RunState::Other("suspended".to_string()))
        ),
        InstanceState::Unknown
    );
}

#[test]
fn test_error_wins_over_any_runstate() {
    for runstate in [
        Some(&RunState::PoweredOn),
        Some(&RunState::PoweredOff),
        None,
    ] {
        assert_eq!(
            project_instance_state(ServiceStatus::Error, runstate),
            InstanceState::Error
        );
        assert_eq!(
            project_instance_state(ServiceStatus::ErrorCreation, runstate),
            InstanceState::Error
        );
    }
}

#[test]
fn test_lifecycle_statuses() {
    assert_eq!(
        project_instance_state(ServiceStatus::Pending, None),
        InstanceState::Pending
    );
    assert_eq!(
        project_instance_state(ServiceStatus::Building, None),
        InstanceState::Building
    );
    assert_eq!(
        project_instance_state(ServiceStatus::Deleting, None),
        InstanceState::ShuttingDown
    );
    assert_eq!(
        project_instance_state(ServiceStatus::Terminated, None),
        InstanceState::Terminated
    );
}

#[test]
fn test_unmapped_status_defaults_to_unknown() {
    assert_eq!(
        project_instance_state(ServiceStatus::Unknown, Some(&RunState::PoweredOn)),
        InstanceState::Unknown
    );
}

#[test]
fn test_runstate_parse() {
    assert_eq!(RunState::parse("poweredOn"), RunState::PoweredOn);
    assert_eq!(RunState::parse("poweredOff"), RunState::PoweredOff);
    assert_eq!(RunState::parse("update"), RunState::Update);
    assert_eq!(
        RunState::parse("migrating"),
        RunState::Other("migrating".to_string())
    );
}

#[test]
fn test_volume_projection_tracks_attachment() {
    assert_eq!(project_volume_state(ServiceStatus::Active, true), "in-use");
    assert_eq!(
        project_volume_state(ServiceStatus::Active, false),
        "available"
    );
    assert_eq!(project_volume_state(ServiceStatus::Pending, false), "creating");
    assert_eq!(project_volume_state(ServiceStatus::Error, true), "error");
}

#[test]
fn test_network_projection() {
    assert_eq!(project_network_state(ServiceStatus::Active), "available");
    assert_eq!(project_network_state(ServiceStatus::Building), "pending");
    assert_eq!(project_network_state(ServiceStatus::Deleting), "deleting");
    assert_eq!(project_network_state(ServiceStatus::Terminated), "unknown");
}

#[test]
fn test_backup_job_projection() {
    assert_eq!(project_backup_job_state(ServiceStatus::Active), "available");
    assert_eq!(project_backup_job_state(ServiceStatus::Updating), "updating");
    assert_eq!(project_backup_job_state(ServiceStatus::Deleting), "removing");
    assert_eq!(project_backup_job_state(ServiceStatus::ErrorCreation), "error");
}

#[test]
fn test_status_serde_round_trip() {
    let json = serde_json::to_string(&ServiceStatus::ErrorCreation).unwrap();
    assert_eq!(json, "\"ERROR_CREATION\"");

    let parsed: ServiceStatus = serde_json::from_str("\"ACTIVE\"").unwrap();
    assert_eq!(parsed, ServiceStatus::Active);
}
