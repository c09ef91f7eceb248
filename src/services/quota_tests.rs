use super::*;

fn flavor(vcpus: u64, ram_mb: u64, disk_gb: u64) -> FlavorDetail {
    FlavorDetail {
        name: "vm.m1".to_string(),
        vcpus,
        ram_mb,
        disk_gb,
        volume_type: None,
    }
}

#[test]
fn test_flavor_default_boot_size() {
    assert_eq!(resolve_boot_size(40, None, None, 0), 40);
}

#[test]
fn test_explicit_override_replaces_flavor_default() {
    assert_eq!(resolve_boot_size(40, Some(100), None, 0), 100);
}

#[test]
fn test_clone_source_overrides_explicit_override() {
    assert_eq!(resolve_boot_size(40, Some(20), Some(80), 0), 80);
}

#[test]
fn test_image_minimum_wins_over_smaller_override() {
    // image min 40, caller override 20: minimum wins
    assert_eq!(resolve_boot_size(10, Some(20), None, 40), 40);
}

#[test]
fn test_image_minimum_does_not_shrink_larger_sizes() {
    assert_eq!(resolve_boot_size(10, Some(100), None, 40), 100);
}

#[test]
fn test_ram_is_converted_to_gb() {
    let delta = aggregate_run_quota(&flavor(4, 8192, 40), 0, None, None, &[]);
    assert_eq!(delta.ram_gb, 8);
    assert_eq!(delta.cores, 4);
    assert_eq!(delta.instances, 1);
}

#[test]
fn test_clone_source_size_reaches_blocks_quota() {
    let delta = aggregate_run_quota(&flavor(2, 4096, 40), 0, Some(20), Some(80), &[]);
    assert_eq!(delta.blocks_gb, 80);
}

#[test]
fn test_additional_volumes_count_and_sizes() {
    let additional = vec![
        AdditionalVolume {
            size_gb: 50,
            volume_type: Some("ssd".to_string()),
        },
        AdditionalVolume {
            size_gb: 200,
            volume_type: None,
        },
    ];
    let delta = aggregate_run_quota(&flavor(2, 2048, 40), 0, None, None, &additional);

    assert_eq!(delta.blocks_gb, 40 + 50 + 200);
    assert_eq!(delta.volumes, 2);
}

#[test]
fn test_serialized_keys_match_quota_vocabulary() {
    let delta = aggregate_run_quota(&flavor(2, 2048, 40), 0, None, None, &[]);
    let value = serde_json::to_value(&delta).unwrap();

    assert_eq!(value["compute.cores"], 2);
    assert_eq!(value["compute.instances"], 1);
    assert_eq!(value["compute.ram"], 2);
    assert_eq!(value["compute.blocks"], 40);
    assert_eq!(value["compute.volumes"], 0);
}

#[test]
fn test_volume_quota() {
    let delta = volume_quota(120);
    assert_eq!(delta.blocks_gb, 120);
    assert_eq!(delta.volumes, 1);
    assert_eq!(delta.instances, 0);
}

#[test]
fn test_resize_quota_only_charges_growth() {
    let delta = resize_quota(&flavor(2, 4096, 40), &flavor(8, 16384, 40));
    assert_eq!(delta.cores, 6);
    assert_eq!(delta.ram_gb, 12);

    let shrink = resize_quota(&flavor(8, 16384, 40), &flavor(2, 4096, 40));
    assert_eq!(shrink.cores, 0);
    assert_eq!(shrink.ram_gb, 0);
}
