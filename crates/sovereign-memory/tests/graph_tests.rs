mod common;

use common::{language_record, open_stores};
use sovereign_memory::knowledge::{
    feature_node_id, language_node_id, Category, Edge, GraphBuilder, LanguageVersion, Node,
    NodeType, Record, Relation, RuntimeVersion,
};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

fn concept(id: &str) -> Node {
    Node::new(id, NodeType::Concept, id.to_uppercase())
}

#[tokio::test]
async fn test_upsert_node_refreshes_properties() {
    let temp = TempDir::new().unwrap();
    let (_db, _records, graph) = open_stores(temp.path()).await;

    graph
        .upsert_node(&concept("linq").with_property("since", "3.0"))
        .await
        .unwrap();
    graph
        .upsert_node(&Node::new("linq", NodeType::Concept, "Language Integrated Query"))
        .await
        .unwrap();

    let node = graph.get_node("linq").await.unwrap().unwrap();
    assert_eq!(node.name, "Language Integrated Query");
    assert!(node.properties.is_empty());
    assert_eq!(graph.stats().await.unwrap().total_nodes, 1);
    assert!(graph.get_node("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_upsert_nodes_batch_skips_existing_ids() {
    let temp = TempDir::new().unwrap();
    let (_db, _records, graph) = open_stores(temp.path()).await;

    let created = graph
        .upsert_nodes_batch(&[concept("a"), concept("b")])
        .await
        .unwrap();
    assert_eq!(created, 2);

    let created = graph
        .upsert_nodes_batch(&[
            Node::new("a", NodeType::Concept, "renamed"),
            concept("c"),
            concept("c"),
        ])
        .await
        .unwrap();
    assert_eq!(created, 1);

    assert_eq!(graph.get_node("a").await.unwrap().unwrap().name, "A");
    assert_eq!(graph.stats().await.unwrap().total_nodes, 3);
}

#[tokio::test]
async fn test_duplicate_edge_triples_are_stored_once() {
    let temp = TempDir::new().unwrap();
    let (_db, _records, graph) = open_stores(temp.path()).await;
    graph
        .upsert_nodes_batch(&[concept("a"), concept("b")])
        .await
        .unwrap();

    let edge = Edge::new("a", "b", Relation::RelatedTo);
    assert!(graph.upsert_edge(&edge).await.unwrap());
    assert!(!graph.upsert_edge(&edge).await.unwrap());
    assert!(!graph.upsert_edge(&edge.clone().with_weight(0.1)).await.unwrap());

    // A different relation is a different edge
    assert!(graph
        .upsert_edge(&Edge::new("a", "b", Relation::DependsOn))
        .await
        .unwrap());

    let created = graph
        .upsert_edges_batch(&[edge.clone(), Edge::new("b", "a", Relation::RelatedTo)])
        .await
        .unwrap();
    assert_eq!(created, 1);

    let stats = graph.stats().await.unwrap();
    assert_eq!(stats.total_edges, 3);
    assert_eq!(stats.relation_type_counts.get("RELATED_TO"), Some(&2));

    let outgoing = graph.outgoing("a", Some(Relation::RelatedTo)).await.unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].weight, 1.0);
}

#[tokio::test]
async fn test_invalid_edges_are_skipped() {
    let temp = TempDir::new().unwrap();
    let (_db, _records, graph) = open_stores(temp.path()).await;

    assert!(!graph
        .upsert_edge(&Edge::new("", "b", Relation::RelatedTo))
        .await
        .unwrap());
    assert!(!graph
        .upsert_edge(&Edge::new("a", "b", Relation::RelatedTo).with_weight(f32::INFINITY))
        .await
        .unwrap());
    assert_eq!(graph.stats().await.unwrap().total_edges, 0);
}

#[tokio::test]
async fn test_find_nodes_by_name_and_type() {
    let temp = TempDir::new().unwrap();
    let (_db, _records, graph) = open_stores(temp.path()).await;
    let builder = GraphBuilder::new(Arc::clone(&graph));
    builder.seed().await.unwrap();

    let core = graph.find_nodes("core", None).await.unwrap();
    assert!(core.iter().any(|n| n.name == "ASP.NET Core"));
    assert!(core.iter().any(|n| n.name == ".NET Core 3.1"));

    let frameworks = graph
        .find_nodes("CORE", Some(NodeType::Framework))
        .await
        .unwrap();
    let names: Vec<&str> = frameworks.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["ASP.NET Core", "Entity Framework Core"]);
}

#[tokio::test]
async fn test_neighbors_sorted_by_weight_and_limited() {
    let temp = TempDir::new().unwrap();
    let (_db, _records, graph) = open_stores(temp.path()).await;
    graph
        .upsert_nodes_batch(&[concept("hub"), concept("x"), concept("y"), concept("z")])
        .await
        .unwrap();

    graph
        .upsert_edges_batch(&[
            Edge::new("hub", "x", Relation::RelatedTo).with_weight(0.2),
            Edge::new("y", "hub", Relation::RelatedTo).with_weight(0.9),
            Edge::new("hub", "z", Relation::RelatedTo).with_weight(0.5),
            // Dangling target is ignored
            Edge::new("hub", "ghost", Relation::RelatedTo).with_weight(1.0),
        ])
        .await
        .unwrap();

    let neighbors = graph.neighbors("hub", 10).await.unwrap();
    let ids: Vec<&str> = neighbors.iter().map(|(n, _)| n.id.as_str()).collect();
    assert_eq!(ids, vec!["y", "z", "x"]);

    let top = graph.neighbors("hub", 2).await.unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].0.id, "y");

    assert!(graph.neighbors("hub", 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_expand_visits_each_node_once() {
    let temp = TempDir::new().unwrap();
    let (_db, _records, graph) = open_stores(temp.path()).await;
    graph
        .upsert_nodes_batch(&[concept("a"), concept("b"), concept("c"), concept("d")])
        .await
        .unwrap();

    // Diamond with a back edge
    graph
        .upsert_edges_batch(&[
            Edge::new("a", "b", Relation::RelatedTo),
            Edge::new("a", "c", Relation::RelatedTo),
            Edge::new("b", "d", Relation::RelatedTo),
            Edge::new("c", "d", Relation::RelatedTo),
            Edge::new("d", "a", Relation::RelatedTo),
        ])
        .await
        .unwrap();

    let result = graph.expand(&["a".to_string()], 5, 10).await.unwrap();

    let ids: Vec<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len());
    assert_eq!(unique, HashSet::from(["a", "b", "c", "d"]));
    assert_eq!(ids[0], "a");
    assert!(result.edges.len() >= 5);
}

#[tokio::test]
async fn test_expand_treats_all_seeds_as_visited() {
    let temp = TempDir::new().unwrap();
    let (_db, _records, graph) = open_stores(temp.path()).await;
    graph
        .upsert_nodes_batch(&[concept("a"), concept("b"), concept("c")])
        .await
        .unwrap();
    graph
        .upsert_edges_batch(&[
            Edge::new("a", "b", Relation::RelatedTo),
            Edge::new("b", "c", Relation::RelatedTo),
        ])
        .await
        .unwrap();

    let seeds: Vec<String> = ["a", "missing", "b", "a"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let result = graph.expand(&seeds, 2, 10).await.unwrap();

    let ids: Vec<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!(!result.contains_node("missing"));
}

#[tokio::test]
async fn test_expand_respects_hop_and_neighbor_bounds() {
    let temp = TempDir::new().unwrap();
    let (_db, _records, graph) = open_stores(temp.path()).await;

    let mut nodes = vec![concept("center")];
    let mut edges = Vec::new();
    for i in 0..10 {
        let spoke = format!("spoke{i}");
        let leaf = format!("leaf{i}");
        nodes.push(concept(&spoke));
        nodes.push(concept(&leaf));
        edges.push(Edge::new("center", spoke.as_str(), Relation::RelatedTo));
        edges.push(Edge::new(spoke.as_str(), leaf.as_str(), Relation::RelatedTo));
    }
    graph.upsert_nodes_batch(&nodes).await.unwrap();
    graph.upsert_edges_batch(&edges).await.unwrap();

    let seeds = vec!["center".to_string()];

    let zero = graph.expand(&seeds, 0, 3).await.unwrap();
    assert_eq!(zero.nodes.len(), 1);
    assert!(zero.edges.is_empty());

    let one = graph.expand(&seeds, 1, 3).await.unwrap();
    assert_eq!(one.nodes.len(), 1 + 3);
    assert!(one.nodes[1..].iter().all(|n| n.id.starts_with("spoke")));

    // Each of the 3 spokes yields at most one new leaf (the center is visited)
    let two = graph.expand(&seeds, 2, 3).await.unwrap();
    assert_eq!(two.nodes.len(), 1 + 3 + 3);

    let unknown = graph.expand(&["nowhere".to_string()], 2, 3).await.unwrap();
    assert!(unknown.nodes.is_empty());
}

#[tokio::test]
async fn test_seed_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let (_db, _records, graph) = open_stores(temp.path()).await;
    let builder = GraphBuilder::new(Arc::clone(&graph));

    let first = builder.seed().await.unwrap();
    let expected_nodes =
        LanguageVersion::ALL.len() + RuntimeVersion::ALL.len() + Category::ALL.len();
    assert_eq!(first.nodes, expected_nodes);
    assert_eq!(first.edges, LanguageVersion::ALL.len() - 1 + 5);
    let after_first = graph.stats().await.unwrap();

    let second = builder.seed().await.unwrap();
    assert_eq!(second.nodes, 0);
    assert_eq!(second.edges, 0);

    let after_second = graph.stats().await.unwrap();
    assert_eq!(after_first.total_nodes, after_second.total_nodes);
    assert_eq!(after_first.total_edges, after_second.total_edges);
    assert_eq!(after_second.node_type_counts.get("csharp_version"), Some(&18));

    let v9 = graph.get_node(&language_node_id(LanguageVersion::V9_0)).await.unwrap().unwrap();
    assert_eq!(v9.name, "C# 9.0");

    let chain = graph
        .outgoing(&language_node_id(LanguageVersion::V9_0), Some(Relation::EvolvedInto))
        .await
        .unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].target, "csharp:10.0");
    assert!((chain[0].weight - 0.8).abs() < 1e-6);

    let blazor_deps = graph
        .outgoing("framework:blazor", Some(Relation::DependsOn))
        .await
        .unwrap();
    assert_eq!(blazor_deps[0].target, "framework:aspnet");
}

#[tokio::test]
async fn test_add_record_creates_structural_edges() {
    let temp = TempDir::new().unwrap();
    let (_db, _records, graph) = open_stores(temp.path()).await;
    let builder = GraphBuilder::new(Arc::clone(&graph));
    builder.seed().await.unwrap();

    let record = Record::new(
        Category::EfCore,
        LanguageVersion::V12_0,
        RuntimeVersion::Net8_0,
        "Complex types",
    )
    .with_packages(["Microsoft.EntityFrameworkCore", "Microsoft.EntityFrameworkCore.Sqlite"]);

    assert_eq!(builder.add_record(&record).await.unwrap(), 5);
    assert_eq!(builder.add_record(&record).await.unwrap(), 0);

    let feature = feature_node_id(&record.id);
    let node = graph.get_node(&feature).await.unwrap().unwrap();
    assert_eq!(node.node_type, NodeType::Feature);
    assert_eq!(node.properties["category"], "ef_core");

    let out = graph.outgoing(&feature, None).await.unwrap();
    let relations: Vec<Relation> = out.iter().map(|e| e.relation).collect();
    assert_eq!(
        relations,
        vec![
            Relation::IntroducedIn,
            Relation::RequiresRuntime,
            Relation::PartOf,
            Relation::UsesPackage,
            Relation::UsesPackage,
        ]
    );

    let package = graph
        .get_node("nuget:microsoft.entityframeworkcore")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(package.name, "Microsoft.EntityFrameworkCore");
    assert_eq!(package.node_type, NodeType::Package);
}

#[tokio::test]
async fn test_version_expansion_scenario() {
    let temp = TempDir::new().unwrap();
    let (_db, _records, graph) = open_stores(temp.path()).await;
    let builder = GraphBuilder::new(Arc::clone(&graph));
    builder.seed().await.unwrap();

    let v9: Vec<Record> = ["Records", "Init-only setters", "Top-level statements"]
        .iter()
        .map(|name| language_record(LanguageVersion::V9_0, name))
        .collect();
    let v10 = language_record(LanguageVersion::V10_0, "Global usings");
    let v11 = language_record(LanguageVersion::V11_0, "Raw string literals");

    for record in v9.iter().chain([&v10, &v11]) {
        builder.add_record(record).await.unwrap();
    }

    let result = graph
        .expand(&[language_node_id(LanguageVersion::V9_0)], 1, 10)
        .await
        .unwrap();

    assert!(result.contains_node("csharp:10.0"));
    for record in &v9 {
        assert!(result.contains_node(&feature_node_id(&record.id)));
    }
    assert!(!result.contains_node(&feature_node_id(&v10.id)));
    assert!(!result.contains_node("csharp:11.0"));
}

#[tokio::test]
async fn test_batch_mode_defers_writes_until_flush() {
    let temp = TempDir::new().unwrap();
    let (_db, _records, graph) = open_stores(temp.path()).await;

    graph.begin_batch().await;
    assert!(graph.is_batching().await);

    graph.upsert_node(&concept("a")).await.unwrap();
    assert_eq!(graph.upsert_nodes_batch(&[concept("a"), concept("b")]).await.unwrap(), 1);
    assert!(graph.upsert_edge(&Edge::new("a", "b", Relation::RelatedTo)).await.unwrap());
    assert!(!graph.upsert_edge(&Edge::new("a", "b", Relation::RelatedTo)).await.unwrap());

    assert!(graph.get_node("a").await.unwrap().is_none());
    assert_eq!(graph.stats().await.unwrap().total_edges, 0);

    assert_eq!(graph.flush().await.unwrap(), 3);
    assert!(graph.is_batching().await);
    assert!(graph.get_node("a").await.unwrap().is_some());
    assert_eq!(graph.stats().await.unwrap().total_edges, 1);

    graph.upsert_node(&concept("c")).await.unwrap();
    assert_eq!(graph.end_batch().await.unwrap(), 1);
    assert!(!graph.is_batching().await);
    assert!(graph.get_node("c").await.unwrap().is_some());

    // Outside batch mode writes are immediate
    graph.upsert_node(&concept("d")).await.unwrap();
    assert!(graph.get_node("d").await.unwrap().is_some());
}

#[tokio::test]
async fn test_build_from_records_flushes_windows() {
    let temp = TempDir::new().unwrap();
    let (_db, _records, graph) = open_stores(temp.path()).await;
    let builder = GraphBuilder::new(Arc::clone(&graph)).with_batch_window(2);

    let records: Vec<Record> = (0..5)
        .map(|i| {
            Record::new(
                Category::Aspnet,
                LanguageVersion::V12_0,
                RuntimeVersion::Net8_0,
                format!("Feature {i}"),
            )
            .with_packages(["Microsoft.AspNetCore.OpenApi"])
        })
        .collect();

    let stats = builder.build_from_records(&records).await.unwrap();
    assert_eq!(stats.seed_nodes, 53);
    assert_eq!(stats.seed_edges, 22);
    assert_eq!(stats.feature_nodes, 5);
    assert_eq!(stats.feature_edges, 5 * 4);
    assert!(!graph.is_batching().await);

    let packages = graph.nodes_by_type(NodeType::Package).await.unwrap();
    assert_eq!(packages.len(), 1);

    let users = graph
        .incoming("nuget:microsoft.aspnetcore.openapi", Some(Relation::UsesPackage))
        .await
        .unwrap();
    assert_eq!(users.len(), 5);

    let graph_stats = graph.stats().await.unwrap();
    assert_eq!(graph_stats.node_type_counts.get("feature"), Some(&5));
    assert_eq!(graph_stats.total_edges, 22 + 20);

    // Rebuilding adds nothing
    let again = builder.build_from_records(&records).await.unwrap();
    assert_eq!(again.seed_nodes, 0);
    assert_eq!(again.feature_edges, 0);
}
