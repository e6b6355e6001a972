//! build → contract → persist → load → route

use butterfly_ch::ch::{prepare, ChQuery, ContractionConfig};
use butterfly_ch::formats::GraphFile;
use butterfly_ch::ingest;
use butterfly_ch::storage::{MmapDirectory, RamDirectory};
use butterfly_ch::{Direction, EdgeFlags, GraphStorage};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const LINE_JSON: &str = r#"{
    "nodes": [
        {"lat": 48.000, "lon": 11.000},
        {"lat": 48.001, "lon": 11.000},
        {"lat": 48.002, "lon": 11.000},
        {"lat": 48.003, "lon": 11.000},
        {"lat": 48.004, "lon": 11.000}
    ],
    "edges": [
        {"from": 0, "to": 1, "distance": 0.001},
        {"from": 1, "to": 2, "distance": 0.001},
        {"from": 2, "to": 3, "distance": 0.001},
        {"from": 3, "to": 4, "distance": 0.001}
    ]
}"#;

#[test]
fn test_json_to_route_through_files() {
    let mut input = NamedTempFile::new().unwrap();
    input.write_all(LINE_JSON.as_bytes()).unwrap();

    let (graph, stats) = ingest::load_file(input.path()).unwrap();
    assert_eq!(stats.edges, 4);

    let dir = TempDir::new().unwrap();
    let base_path = dir.path().join("line.bch");
    GraphFile::write(&base_path, &graph).unwrap();

    let mut g = GraphFile::read(&base_path).unwrap();
    assert!(!g.is_contracted());
    prepare(&mut g, &ContractionConfig::default()).unwrap();
    let ch_path = dir.path().join("line.ch.bch");
    GraphFile::write(&ch_path, &g).unwrap();

    let loaded = GraphFile::read(&ch_path).unwrap();
    assert!(loaded.is_contracted());
    assert_eq!(loaded.shortcut_count(), g.shortcut_count());
    let (min_lat, _, max_lat, _) = loaded.bounds().degrees().unwrap();
    assert!((min_lat - 48.0).abs() < 1e-7 && (max_lat - 48.004).abs() < 1e-7);

    let route = ChQuery::new(&loaded).route(0, 4).unwrap().unwrap();
    // 1 mm per edge
    assert_eq!(route.weight, 4);
    let hops: Vec<_> = route.edges.iter().map(|e| (e.from, e.to)).collect();
    assert_eq!(hops, vec![(0, 1), (1, 2), (2, 3), (3, 4)]);
}

#[test]
fn test_mmap_backed_graph_contracts() {
    let dir = TempDir::new().unwrap();
    let directory = MmapDirectory::new(dir.path()).unwrap();
    let mut g = GraphStorage::create(&directory).unwrap();
    for i in 0..30u32 {
        g.add_edge(i, i + 1, 2, EdgeFlags::both()).unwrap();
    }
    g.add_edge(0, 30, 100, EdgeFlags::both()).unwrap();
    prepare(&mut g, &ContractionConfig::default()).unwrap();
    g.flush().unwrap();

    let mut query = ChQuery::new(&g);
    assert_eq!(query.weight(0, 30).unwrap(), Some(60));
    assert_eq!(query.weight(30, 5).unwrap(), Some(50));
}

#[test]
fn test_ram_directory_persists_tables() {
    let dir = TempDir::new().unwrap();
    let directory = RamDirectory::persistent(dir.path()).unwrap();
    let mut g = GraphStorage::create(&directory).unwrap();
    g.add_edge(0, 1, 5, EdgeFlags::forward()).unwrap();
    g.flush().unwrap();

    assert!(dir.path().join("nodes").exists());
    let edges = std::fs::read(dir.path().join("edges")).unwrap();
    // at least one 10-word edge record, weight split over words 4 and 5
    assert!(edges.len() >= 40);
    assert_eq!(u64::from_le_bytes(edges[16..24].try_into().unwrap()), 5);
    assert_eq!(g.edges_of(1, Direction::Incoming).count(), 1);
}
