//! File-to-file pipeline tests: CSV in, record stream out

use std::fs::File;
use std::io::{BufWriter, Read, Write};

use gravtree::{read_points_file, ClusterConfig, ClusterEngine, MergeWriter};

#[test]
fn test_csv_file_to_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("points.csv");
    let output_path = dir.path().join("tree.txt");

    let mut input = File::create(&input_path).unwrap();
    writeln!(input, "longitude,latitude,weight").unwrap();
    writeln!(input, "-87.65,41.85,2700").unwrap();
    writeln!(input, "-87.90,41.98,1100").unwrap();
    writeln!(input, "-88.15,41.77,0").unwrap();
    writeln!(input, "-87.72,42.05,800").unwrap();
    writeln!(input, "-86.25,39.76,900").unwrap();
    drop(input);

    let points = read_points_file(&input_path, None).unwrap();
    assert_eq!(points.len(), 4);

    let mut engine = ClusterEngine::new(points, ClusterConfig::default());
    let out = File::create(&output_path).unwrap();
    let mut sink = MergeWriter::new(BufWriter::new(out));
    let stats = engine.run(&mut sink).unwrap();
    assert_eq!(stats.merges, 3);

    let mut text = String::new();
    File::open(&output_path)
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    for (i, line) in lines.iter().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(fields.len(), 13);
        assert_eq!(fields[0], (i + 1).to_string());
        // Side A is the heavier side.
        let n_a: f64 = fields[2].parse().unwrap();
        let n_b: f64 = fields[8].parse().unwrap();
        assert!(n_a >= n_b);
    }
}

#[test]
fn test_missing_input_file_is_io_error() {
    let err = read_points_file("/nonexistent/points.csv", None).unwrap_err();
    assert!(matches!(err, gravtree::ClusterError::Io(_)));
}
