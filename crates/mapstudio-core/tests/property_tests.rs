use mapstudio_core::paths::{from_json_path, from_xml_path, to_canonical, to_json_path, to_xml_path};
use mapstudio_core::{
    GraphGesture, LayoutConfig, MappingOrigin, MappingSession, MappingSuggestion, NodeRole,
    SourceType, TargetType,
};
use proptest::prelude::*;
use std::collections::HashSet;

fn segment() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9_-]{1,8}").unwrap()
}

fn canonical_path() -> impl Strategy<Value = String> {
    proptest::collection::vec(segment(), 0..5).prop_map(|segments| segments.join("."))
}

fn messy_path() -> impl Strategy<Value = String> {
    let sep = prop_oneof![Just("."), Just("/"), Just("//"), Just(".."), Just("["), Just("]")];
    proptest::collection::vec((sep, segment()), 0..6).prop_map(|parts| {
        parts
            .into_iter()
            .map(|(sep, seg)| format!("{sep}{seg}"))
            .collect::<String>()
    })
}

fn suggestions() -> impl Strategy<Value = Vec<MappingSuggestion>> {
    let pool = prop_oneof![Just("a.b"), Just("a.c"), Just("d"), Just("")];
    let targets = prop_oneof![Just("x.y"), Just("x.z"), Just("w"), Just("")];
    proptest::collection::vec((pool, targets, 0.0f64..1.2), 0..6).prop_map(|rows| {
        rows.into_iter()
            .map(|(s, t, c)| MappingSuggestion::new(s, t, c))
            .collect()
    })
}

#[derive(Debug, Clone)]
enum Op {
    Connect(usize, usize),
    Disconnect(usize),
    Rename(usize, String),
    Add,
    Remove(usize),
    SelectEdgeThenDelete(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Connect(a, b)),
        any::<usize>().prop_map(Op::Disconnect),
        (any::<usize>(), "[a-z ]{0,6}").prop_map(|(a, t)| Op::Rename(a, t)),
        Just(Op::Add),
        any::<usize>().prop_map(Op::Remove),
        any::<usize>().prop_map(Op::SelectEdgeThenDelete),
    ]
}

fn pick(ids: &[String], index: usize) -> String {
    if ids.is_empty() {
        "s:stale".to_string()
    } else {
        ids[index % ids.len()].clone()
    }
}

fn to_gestures(session: &mut MappingSession, op: Op) -> Vec<GraphGesture> {
    let graph = session.projection();
    let sources: Vec<String> = graph.nodes_with_role(NodeRole::Source).map(|n| n.id.clone()).collect();
    let targets: Vec<String> = graph.nodes_with_role(NodeRole::Target).map(|n| n.id.clone()).collect();
    let nodes: Vec<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();
    let edges: Vec<String> = graph.edges.iter().map(|e| e.id.clone()).collect();
    match op {
        Op::Connect(a, b) => vec![GraphGesture::Connect {
            source: pick(&sources, a),
            target: pick(&targets, b),
        }],
        Op::Disconnect(a) => vec![GraphGesture::Disconnect { edge: pick(&edges, a) }],
        Op::Rename(a, token) => vec![GraphGesture::Rename {
            node: pick(&nodes, a),
            new_leaf: token,
        }],
        Op::Add => vec![GraphGesture::AddUnattachedSource],
        Op::Remove(a) => vec![GraphGesture::RemoveOrphanSource { node: pick(&sources, a) }],
        Op::SelectEdgeThenDelete(a) => vec![
            GraphGesture::SelectEdge { edge: pick(&edges, a) },
            GraphGesture::DeleteSelected,
        ],
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn canonicalization_is_idempotent(raw in ".{0,40}") {
        let once = to_canonical(&raw);
        prop_assert_eq!(to_canonical(&once), once.clone());
        prop_assert!(!once.contains('/'));
        prop_assert!(!once.starts_with('.') && !once.ends_with('.'));
        prop_assert!(!once.contains(".."));
    }

    #[test]
    fn messy_separators_collapse(raw in messy_path()) {
        let canonical = to_canonical(&raw);
        prop_assert!(!canonical.contains(".."));
        prop_assert!(!canonical.contains('['));
        prop_assert_eq!(to_canonical(&canonical), canonical.clone());
    }

    #[test]
    fn notations_round_trip(path in canonical_path()) {
        prop_assert_eq!(from_xml_path(&to_xml_path(&path)), path.clone());
        prop_assert_eq!(from_json_path(&to_json_path(&path)), path);
    }

    #[test]
    fn gesture_sequences_keep_the_graph_closed_and_edits_sticky(
        seed in suggestions(),
        ops in proptest::collection::vec(op(), 0..20),
    ) {
        let mut session = MappingSession::new(LayoutConfig::default(), SourceType::Json, TargetType::Xml);
        session.replace_all(seed);
        let mut edited = HashSet::new();

        for op in ops {
            for gesture in to_gestures(&mut session, op) {
                session.apply(gesture);
            }

            for record in session.records() {
                if edited.contains(&record.id) {
                    prop_assert_eq!(record.mapping_origin, MappingOrigin::Edited);
                }
                if record.mapping_origin == MappingOrigin::Edited {
                    edited.insert(record.id);
                }
            }

            let records = session.records().to_vec();
            let orphan_sources = session.store().orphans().sources().to_vec();
            let graph = session.projection();
            prop_assert!(graph.is_closed());
            for edge in &graph.edges {
                let record = records.iter().find(|r| r.id == edge.record_id);
                prop_assert!(record.is_some_and(|r| r.is_active()));
            }
            for node in &graph.nodes {
                if node.missing {
                    prop_assert!(!records.iter().any(|r| r.is_active() && r.target_path == node.key.path));
                }
            }
            for path in &orphan_sources {
                prop_assert!(!records.iter().any(|r| r.is_active() && &r.source_path == path));
            }
        }
    }
}
