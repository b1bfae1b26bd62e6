use intfbatch::{BatchError, BatchLayout, Configuration, PairList, PrmReader, StageGate};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_batch_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("batch_tops.config");
    fs::write(
        &path,
        "\
#####################################################
# processing stage for intf_batch.csh
proc_stage = 1

# name of the master image
master_image = S1_20150526_ALL_F1

# filter wavelength
filter_wavelength = 200

dec_factor = 2
range_dec = 8
azimuth_dec = 2

topo_phase = 1
shift_topo = 0

threshold_snaphu = 0
threshold_geocode = 0.10
region_cut = 0/21600/0/5568
switch_land = 1
defomax = 0
near_interp = 0
mask_water = 1
",
    )
    .unwrap();

    let config = Configuration::load(&path).unwrap();
    assert_eq!(config.proc_stage, StageGate::TOPOGRAPHY);
    assert_eq!(config.master_image.as_deref(), Some("S1_20150526_ALL_F1"));
    assert_eq!(config.range_dec, Some(8));
    assert_eq!(config.azimuth_dec, Some(2));
    assert!(config.topo_phase);
    assert!(!config.shift_topo);
    assert!(config.geocode_requested());
    // mask is only needed when unwrapping
    assert!(!config.needs_landmask());
    assert_eq!(config.region_cut.unwrap().to_string(), "0/21600/0/5568");
}

#[test]
fn test_missing_input_files() {
    let dir = TempDir::new().unwrap();

    assert!(matches!(
        Configuration::load(dir.path().join("absent.config")),
        Err(BatchError::MissingInput { .. })
    ));
    assert!(matches!(
        PairList::parse(dir.path().join("intf.in")),
        Err(BatchError::MissingInput { .. })
    ));
    assert!(matches!(
        PrmReader::read_epoch(dir.path().join("raw/none.PRM")),
        Err(BatchError::MissingInput { .. })
    ));
    assert!(matches!(
        BatchLayout::new(dir.path().join("no-such-root")),
        Err(BatchError::MissingInput { .. })
    ));
}

#[test]
fn test_manifest_line_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("intf.in");
    fs::write(&path, "S1_A:S1_B\nS1_A-S1_C\n").unwrap();

    let err = PairList::parse(&path).unwrap_err();
    assert!(matches!(err, BatchError::ManifestParse { line: 2, .. }));
    assert!(err.to_string().contains("line 2"));
}

#[test]
fn test_prm_without_clock_is_metadata_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("S1_A.PRM");
    fs::write(&path, "SLC_file = S1_A.SLC\nclock_start = 146.59\n").unwrap();

    assert!(matches!(
        PrmReader::read_epoch(&path),
        Err(BatchError::Metadata { .. })
    ));
}
