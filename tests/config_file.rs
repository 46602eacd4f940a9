use std::io::Write;

use blocked_apsp::{Error, KernelKind, PaddingPolicy, Solver, SolverConfig, WeightMatrix};

#[test]
fn solver_from_toml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "block_size = 3").unwrap();
    writeln!(file, "threads = 2").unwrap();
    writeln!(file, "kernel = \"scalar\"").unwrap();
    writeln!(file, "padding = \"strict\"").unwrap();

    let config = SolverConfig::from_file(file.path()).unwrap();
    assert_eq!(
        config,
        SolverConfig { block_size: 3, threads: 2, kernel: KernelKind::Scalar, padding: PaddingPolicy::Strict }
    );

    let solver = Solver::new(config).unwrap();
    let mut m = WeightMatrix::from_edges(6, [(0, 1, 1_u32), (1, 5, 1)]).unwrap();
    let report = solver.solve(&mut m).unwrap();
    assert_eq!(report.rounds, 2);
    assert_eq!(m.distance(0, 5), Some(2));
}

#[test]
fn missing_file_reports_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    match SolverConfig::from_file(&path) {
        Err(Error::Config(message)) => assert!(message.contains("absent.toml"), "{message}"),
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn malformed_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("apsp.toml");
    std::fs::write(&path, "block_size = \"large\"\n").unwrap();
    assert!(matches!(SolverConfig::from_file(&path), Err(Error::Config(_))));
}
