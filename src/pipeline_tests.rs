#[cfg(test)]
mod tests {
    use crate::config::{DependencyStrategy, GraphConfig, MetricConfig};
    use crate::dependency::DependencyArc;
    use crate::graph::{NodeId, NodeKind};
    use crate::pipeline::ConceptGraph;
    use crate::resolve::resolve_references;
    use crate::tokens::{PosTag, Token};
    use crate::validate::{
        validate_dependency_tree, validate_sentence_tree, validate_store, HealthCheck, Severity,
    };
    use crate::{Error, Result};
    use ndarray::array;
    use proptest::prelude::*;

    fn token(word: &str, lemma: &str, pos: PosTag, v: f32) -> Token {
        Token::new(word, lemma, pos, array![v, 1.0 - v])
    }

    fn nouns(words: &[(&str, f32)]) -> Vec<Token> {
        words
            .iter()
            .map(|&(w, v)| token(w, w, PosTag::Noun, v))
            .collect()
    }

    fn resolving() -> GraphConfig {
        GraphConfig::default().with_metric(MetricConfig::new().with_reference_threshold(0.0))
    }

    #[test]
    fn test_cat_sat_on_the_mat() -> Result<()> {
        let mut graph = ConceptGraph::new(GraphConfig::default())?;
        let tokens = nouns(&[
            ("the", 0.10),
            ("cat", 0.55),
            ("sat", 0.70),
            ("on", 0.30),
            ("the", 0.10),
            ("mat", 0.60),
        ]);
        let sentence = graph.process_sentence(&tokens)?;
        let store = graph.store();

        let head = &store[sentence.head];
        assert_eq!(head.kind, NodeKind::Head);
        assert_eq!(head.subgraph_size, 6);
        assert_eq!(head.children.len(), 2);
        let (left, right) = (&store[head.children[0]], &store[head.children[1]]);
        assert_eq!(left.word_index_max + 1, right.word_index_min);
        assert_eq!(left.word_index_min, 0);
        assert_eq!(right.word_index_max, 5);

        // Six leaves, four branches and the head; the repeated "the" never
        // resolves against itself.
        assert_eq!(sentence.nodes.len(), 11);
        assert!(sentence.references.is_empty());
        assert_eq!(sentence.merges.as_ref().map(|m| m.n_merges()), Some(5));
        assert_eq!(store.lookup("the").map(|m| m.len()), Some(2));

        let report = validate_sentence_tree(store, sentence.head);
        assert!(report.is_clean(), "{}", report);
        Ok(())
    }

    #[test]
    fn test_self_sentence_exclusion() -> Result<()> {
        let mut graph = ConceptGraph::new(resolving())?;
        let first = graph.process_sentence(&nouns(&[("the", 0.1), ("dog", 0.5), ("ran", 0.8)]))?;
        assert!(first.references.is_empty());

        let second = graph.process_sentence(&nouns(&[
            ("the", 0.1),
            ("dog", 0.5),
            ("ran", 0.8),
            ("again", 0.3),
        ]))?;
        assert!(!second.references.is_empty());
        for reference in &second.references {
            let candidate = &graph.store()[reference.candidate];
            assert_eq!(candidate.sentence_index, 0);
            assert_eq!(candidate.activation_time, 1);
        }
        // "again" has no earlier instance and stays.
        let again = graph.store().lookup("again").map(|m| m.len());
        assert_eq!(again, Some(1));
        assert!(graph.is_healthy());
        Ok(())
    }

    #[test]
    fn test_resolution_disabled_keeps_duplicates() -> Result<()> {
        let config = resolving().with_reference_resolution(false);
        let mut graph = ConceptGraph::new(config)?;
        let words = [("the", 0.1), ("dog", 0.5)];
        let _ = graph.process_sentence(&nouns(&words))?;
        let second = graph.process_sentence(&nouns(&words))?;

        assert!(second.references.is_empty());
        assert_eq!(graph.store().lookup("dog").map(|m| m.len()), Some(2));
        Ok(())
    }

    #[test]
    fn test_copula_becomes_relationship() -> Result<()> {
        let config = GraphConfig::default()
            .with_semantic_transform(true)
            .with_reference_resolution(false);
        let mut graph = ConceptGraph::new(config)?;
        let tokens = vec![
            token("the", "the", PosTag::Det, 0.10),
            token("cat", "cat", PosTag::Noun, 0.15),
            token("is", "be", PosTag::Aux, 0.80),
            token("happy", "happy", PosTag::Adj, 0.85),
        ];
        let sentence = graph.process_sentence(&tokens)?;
        let store = graph.store();

        let is = sentence.relationships[0];
        assert_eq!(sentence.relationships.len(), 1);
        assert_eq!(store[is].lemma, "be");
        assert_eq!(store[is].kind, NodeKind::Relationship);

        let children = &store[sentence.head].children;
        assert_eq!(children.len(), 3);
        assert_eq!(children[1], is);
        assert_eq!(store[children[0]].lemma, "thecat");
        assert_eq!(store[children[2]].lemma, "happy");
        Ok(())
    }

    #[test]
    fn test_no_relationship_words_leave_tree_unchanged() -> Result<()> {
        let words = [("the", 0.1), ("red", 0.4), ("ball", 0.45)];
        let mut plain = ConceptGraph::new(GraphConfig::default())?;
        let mut semantic = ConceptGraph::new(GraphConfig::default().with_semantic_transform(true))?;
        let a = plain.process_sentence(&nouns(&words))?;
        let b = semantic.process_sentence(&nouns(&words))?;

        assert!(b.relationships.is_empty());
        let lemmas = |g: &ConceptGraph, head: NodeId| -> Vec<String> {
            g.store()[head]
                .children
                .iter()
                .map(|&c| g.store()[c].lemma.clone())
                .collect()
        };
        assert_eq!(lemmas(&plain, a.head), lemmas(&semantic, b.head));
        Ok(())
    }

    #[test]
    fn test_second_resolution_pass_is_noop() -> Result<()> {
        let mut graph = ConceptGraph::new(resolving())?;
        let _ = graph.process_sentence(&nouns(&[("a", 0.2), ("b", 0.6), ("c", 0.9)]))?;
        let sentence = graph.process_sentence(&nouns(&[("a", 0.2), ("b", 0.6), ("d", 0.4)]))?;
        let before: Vec<_> = graph
            .store()
            .iter()
            .map(|(id, n)| (id, n.children.clone(), n.activation_time))
            .collect();

        let metric = graph.config().metric.clone();
        let again = resolve_references(graph.store_mut(), sentence.head, &metric, sentence.sentence_index);
        assert!(again.references.is_empty());

        let after: Vec<_> = graph
            .store()
            .iter()
            .map(|(id, n)| (id, n.children.clone(), n.activation_time))
            .collect();
        assert_eq!(before, after);
        Ok(())
    }

    #[test]
    fn test_failed_sentence_rolls_back() -> Result<()> {
        let mut graph = ConceptGraph::new(resolving())?;
        let first = graph.process_sentence(&nouns(&[("the", 0.1), ("dog", 0.5)]))?;
        let len = graph.store().len();

        // Two roots: rejected after the tree was built.
        let arcs = [DependencyArc::root("ROOT"), DependencyArc::root("ROOT")];
        let err = graph
            .process_with_arcs(&nouns(&[("the", 0.1), ("dog", 0.5)]), &arcs)
            .err();
        assert!(matches!(err, Some(Error::InvalidParse { .. })));

        assert_eq!(graph.store().len(), len);
        assert_eq!(graph.heads(), &[first.head]);
        assert!(graph.store().iter().all(|(_, n)| n.activation_time == 0));

        let next = graph.process_sentence(&nouns(&[("the", 0.1), ("cat", 0.7)]))?;
        assert_eq!(next.sentence_index, 2);
        Ok(())
    }

    #[test]
    fn test_primary_source_dependency() -> Result<()> {
        let config = GraphConfig::default()
            .with_dependency(Some(DependencyStrategy::PrimarySource))
            .with_reference_resolution(false);
        let mut graph = ConceptGraph::new(config)?;
        let sentence = graph.process_sentence(&nouns(&[
            ("dogs", 0.2),
            ("chase", 0.7),
            ("small", 0.4),
            ("cats", 0.45),
        ]))?;

        let root = sentence.dependency_root();
        assert!(root.is_some());
        let tree = sentence.dependency.as_ref().map(|d| d.len());
        assert_eq!(tree, Some(3));
        if let Some(root) = root {
            let report = validate_dependency_tree(graph.store(), root, &sentence.leaves);
            assert!(report.is_clean(), "{}", report);
        }
        Ok(())
    }

    #[test]
    fn test_acyclic_dependency_with_transform() -> Result<()> {
        let config = GraphConfig::default()
            .with_semantic_transform(true)
            .with_dependency(Some(DependencyStrategy::Acyclic))
            .with_reference_resolution(false);
        let mut graph = ConceptGraph::new(config)?;
        let tokens = vec![
            token("birds", "bird", PosTag::Noun, 0.2),
            token("fly", "fly", PosTag::Verb, 0.6),
            token("south", "south", PosTag::Adv, 0.5),
        ];
        let sentence = graph.process_sentence(&tokens)?;
        let root = sentence.dependency_root();
        assert!(root.is_some());
        if let Some(root) = root {
            let report = validate_dependency_tree(graph.store(), root, &sentence.leaves);
            assert!(report.is_healthy(), "{}", report);
        }
        Ok(())
    }

    #[test]
    fn test_formal_arcs_through_pipeline() -> Result<()> {
        let mut graph = ConceptGraph::new(GraphConfig::default())?;
        let tokens = nouns(&[("the", 0.1), ("cat", 0.5), ("sat", 0.9)]);
        let arcs = [
            DependencyArc::new(1, "det"),
            DependencyArc::new(2, "nsubj"),
            DependencyArc::root("ROOT"),
        ];
        let sentence = graph.process_with_arcs(&tokens, &arcs)?;
        let store = graph.store();

        let root = sentence.dependency_root();
        assert_eq!(root.map(|r| store[r].lemma.as_str()), Some("sat"));
        assert_eq!(
            sentence.leaves.iter().map(|&l| store[l].dependency_level).collect::<Vec<_>>(),
            vec![2, 1, 0]
        );
        Ok(())
    }

    fn vocabulary() -> Vec<(&'static str, PosTag)> {
        vec![
            ("the", PosTag::Det),
            ("dog", PosTag::Noun),
            ("cat", PosTag::Noun),
            ("run", PosTag::Verb),
            ("on", PosTag::Adp),
            ("red", PosTag::Adj),
        ]
    }

    fn sentences() -> impl Strategy<Value = Vec<Vec<(usize, f32)>>> {
        proptest::collection::vec(
            proptest::collection::vec((0usize..6, 0.0f32..1.0), 1..7),
            1..6,
        )
    }

    proptest! {
        #[test]
        fn store_stays_acyclic(corpus in sentences(), semantic in any::<bool>()) {
            let config = resolving().with_semantic_transform(semantic);
            let mut graph = ConceptGraph::new(config).unwrap();
            let vocab = vocabulary();

            for words in &corpus {
                let tokens: Vec<Token> = words
                    .iter()
                    .map(|&(w, v)| {
                        let (lemma, pos) = vocab[w];
                        token(lemma, lemma, pos, v)
                    })
                    .collect();
                // Short sentences and dangling conditions fail and roll back.
                let _ = graph.process_sentence(&tokens);
            }

            let report = validate_store(graph.store(), graph.heads());
            prop_assert!(report.issues_at_level(Severity::Critical).is_empty(), "{}", report);
            prop_assert!(report.is_healthy(), "{}", report);
            prop_assert_eq!(graph.next_sentence(), corpus.len());
        }

        #[test]
        fn head_covers_every_word(values in proptest::collection::vec(0.0f32..1.0, 2..10)) {
            let mut graph = ConceptGraph::new(GraphConfig::default()).unwrap();
            let tokens: Vec<Token> = values
                .iter()
                .enumerate()
                .map(|(i, &v)| {
                    let w = format!("w{i}");
                    token(&w, &w, PosTag::Noun, v)
                })
                .collect();
            let sentence = graph.process_sentence(&tokens).unwrap();
            let store = graph.store();

            prop_assert_eq!(store[sentence.head].subgraph_size, values.len());
            prop_assert_eq!(sentence.leaves.len(), values.len());
            let branches = sentence
                .nodes
                .iter()
                .filter(|&&id| store[id].kind == NodeKind::Branch)
                .count();
            prop_assert_eq!(branches, values.len() - 2);
        }
    }
}
