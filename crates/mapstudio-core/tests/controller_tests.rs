use mapstudio_core::record::DISCONNECT_NOTE;
use mapstudio_core::{
    EditOutcome, GraphGesture, LayoutConfig, MappingOrigin, MappingSession, MappingSuggestion,
    NodeRole, Position, RecordPatch, SourceType, TargetType,
};

fn session_with(pairs: &[(&str, &str)]) -> MappingSession {
    let mut session = MappingSession::new(LayoutConfig::default(), SourceType::Json, TargetType::Json);
    session.replace_all(
        pairs
            .iter()
            .map(|(s, t)| MappingSuggestion::new(s, t, 0.82))
            .collect(),
    );
    session
}

fn first_edge(session: &mut MappingSession) -> String {
    session.projection().edges[0].id.clone()
}

#[test]
fn disconnect_keeps_the_target_visible() {
    let mut session = session_with(&[("a.b", "x.y")]);
    let edge = first_edge(&mut session);

    let outcome = session.apply(GraphGesture::Disconnect { edge });
    assert!(outcome.is_applied());

    let record = &session.records()[0];
    assert!(!record.selected);
    assert_eq!(record.mapping_origin, MappingOrigin::Edited);
    assert_eq!(session.store().orphans().targets(), ["x.y".to_string()]);

    let graph = session.projection();
    assert!(graph.has_node("t:x.y"));
    assert!(graph.edges.is_empty());
}

#[test]
fn disconnect_notes_blank_rows_only() {
    let mut session = session_with(&[("a.b", "x.y"), ("c", "z")]);
    session.upsert_by_index(1, RecordPatch::default().notes("checked by hand"));

    for _ in 0..2 {
        let edge = first_edge(&mut session);
        assert!(session.apply(GraphGesture::Disconnect { edge }).is_applied());
    }

    let records = session.records();
    assert!(records.iter().all(|r| !r.selected));
    assert_eq!(records[0].notes, DISCONNECT_NOTE);
    assert_eq!(records[1].notes, "checked by hand");
}

#[test]
fn reconnect_after_disconnect_is_an_edit() {
    let mut session = session_with(&[("a.b", "x.y")]);
    let edge = first_edge(&mut session);
    session.apply(GraphGesture::Disconnect { edge });
    session.apply(GraphGesture::Connect {
        source: "s:a.b".into(),
        target: "t:x.y".into(),
    });

    assert_eq!(session.records().len(), 1);
    let record = &session.records()[0];
    assert!(record.selected);
    assert_eq!(record.mapping_origin, MappingOrigin::Edited);
    assert_eq!(record.reason, "Manually connected");
    assert_eq!(session.projection().edges.len(), 1);
    // The orphan entry goes as soon as the record mutation prunes it.
    assert!(session.store().orphans().targets().is_empty());
}

#[test]
fn unattached_sources_take_the_smallest_free_number() {
    let mut session = session_with(&[("a", "x")]);
    session.apply(GraphGesture::AddUnattachedSource);
    session.apply(GraphGesture::AddUnattachedSource);
    assert_eq!(
        session.store().orphans().sources(),
        ["source.newField1".to_string(), "source.newField2".to_string()]
    );
    assert_eq!(session.records().len(), 1);

    session.apply(GraphGesture::RemoveOrphanSource {
        node: "s:source.newField1".into(),
    });
    session.apply(GraphGesture::AddUnattachedSource);
    assert_eq!(
        session.store().orphans().sources(),
        ["source.newField2".to_string(), "source.newField1".to_string()]
    );
}

#[test]
fn wiring_an_unattached_source_prunes_the_orphan() {
    let mut session = session_with(&[("a", "x")]);
    session.apply(GraphGesture::AddUnattachedSource);
    let outcome = session.apply(GraphGesture::Connect {
        source: "s:source.newField1".into(),
        target: "t:x".into(),
    });
    assert!(outcome.is_applied());
    assert!(session.store().orphans().sources().is_empty());
    let graph = session.projection();
    assert_eq!(graph.edges.len(), 2);
    assert_eq!(graph.node("s:source.newField1").map(|n| n.orphan), Some(false));
}

#[test]
fn rename_rewrites_every_record_on_the_node() {
    let mut session = session_with(&[
        ("person.name", "customer.legalName"),
        ("person.alias", "customer.legalName"),
        ("person.id", "customer.id"),
    ]);
    let outcome = session.apply(GraphGesture::Rename {
        node: "t:customer.legalName".into(),
        new_leaf: "full name".into(),
    });
    assert!(outcome.is_applied());

    for record in &session.records()[..2] {
        assert_eq!(record.target_path, "customer.full_name");
        assert_eq!(record.mapping_origin, MappingOrigin::Edited);
        assert!(record.manual_override);
    }
    assert_eq!(session.records()[2].mapping_origin, MappingOrigin::LlmDerived);

    let graph = session.projection();
    assert!(graph.has_node("t:customer.full_name"));
    assert!(!graph.has_node("t:customer.legalName"));
}

#[test]
fn rename_only_touches_the_named_role() {
    let mut session = session_with(&[("shared", "shared")]);
    session.apply(GraphGesture::Rename {
        node: "s:shared".into(),
        new_leaf: "renamed".into(),
    });
    let record = &session.records()[0];
    assert_eq!(record.source_path, "renamed");
    assert_eq!(record.target_path, "shared");
}

#[test]
fn stale_gesture_after_refresh_is_ignored() {
    let mut session = session_with(&[("a", "x")]);
    let edge = first_edge(&mut session);
    session.replace_all(vec![MappingSuggestion::new("a", "x", 0.5)]);

    let outcome = session.apply(GraphGesture::Disconnect { edge });
    assert!(matches!(outcome, EditOutcome::Ignored { .. }));
    assert!(session.records()[0].selected);
    assert_eq!(session.records()[0].mapping_origin, MappingOrigin::LlmDerived);
}

#[test]
fn dragged_positions_survive_edits() {
    let mut session = session_with(&[("a", "x"), ("b", "y")]);
    session.apply(GraphGesture::MoveNode {
        node: "t:y".into(),
        x: 640.0,
        y: 12.0,
    });
    let edge = first_edge(&mut session);
    session.apply(GraphGesture::Disconnect { edge });

    let graph = session.projection();
    assert_eq!(graph.node("t:y").map(|n| n.position), Some(Position::new(640.0, 12.0)));
    let sources: Vec<Position> = graph
        .nodes_with_role(NodeRole::Source)
        .map(|n| n.position)
        .collect();
    assert_eq!(sources, [Position::new(40.0, 56.0), Position::new(40.0, 160.0)]);
}

#[test]
fn any_edit_closes_the_review_gate() {
    let mut session = session_with(&[("a", "x")]);
    session.confirm();
    assert!(session.ensure_exportable().is_ok());
    session.apply(GraphGesture::AddUnattachedSource);
    assert!(session.is_confirmed());

    let edge = first_edge(&mut session);
    session.apply(GraphGesture::Disconnect { edge });
    assert!(!session.is_confirmed());
    assert!(session.ensure_exportable().is_err());
}
