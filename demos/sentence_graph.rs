use std::collections::HashMap;

use lexgraph::{
    ConceptGraph, ConceptStore, DependencyStrategy, GraphConfig, HealthCheck, MetricConfig, NodeId,
    PosTag, Token,
};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DIM: usize = 16;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=lexgraph=debug shows merges and references.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Stand-in embeddings: one random vector per lemma, fixed by the seed.
    let mut rng = StdRng::seed_from_u64(7);
    let mut vectors: HashMap<&str, Array1<f32>> = HashMap::new();

    let corpus: Vec<Vec<(&str, &str, PosTag)>> = vec![
        vec![
            ("the", "the", PosTag::Det),
            ("dog", "dog", PosTag::Noun),
            ("ran", "run", PosTag::Verb),
        ],
        vec![
            ("the", "the", PosTag::Det),
            ("dog", "dog", PosTag::Noun),
            ("ran", "run", PosTag::Verb),
            ("again", "again", PosTag::Adv),
        ],
        vec![
            ("the", "the", PosTag::Det),
            ("cat", "cat", PosTag::Noun),
            ("is", "be", PosTag::Aux),
            ("happy", "happy", PosTag::Adj),
        ],
        // Single word: rejected and rolled back.
        vec![("hello", "hello", PosTag::Intj)],
    ];

    let config = GraphConfig::new()
        .with_metric(MetricConfig::new().with_reference_threshold(0.05))
        .with_semantic_transform(true)
        .with_dependency(Some(DependencyStrategy::PrimarySource));
    let mut graph = ConceptGraph::new(config)?;

    for words in &corpus {
        let tokens: Vec<Token> = words
            .iter()
            .map(|&(text, lemma, pos)| {
                let vector = vectors
                    .entry(lemma)
                    .or_insert_with(|| Array1::from_iter((0..DIM).map(|_| rng.gen::<f32>())))
                    .clone();
                Token::new(text, lemma, pos, vector)
            })
            .collect();

        match graph.process_sentence(&tokens) {
            Ok(sentence) => {
                println!("sentence {}:", sentence.sentence_index);
                print_tree(graph.store(), sentence.head, 1);
                for reference in &sentence.references {
                    println!(
                        "  reused {:?} from sentence {} (metric {:.3})",
                        reference.lemma,
                        graph.store()[reference.candidate].sentence_index,
                        reference.metric
                    );
                }
                if let Some(root) = sentence.dependency_root() {
                    println!("  dependency root: {}", graph.store()[root].word);
                }
            }
            Err(err) => println!("sentence failed: {err}"),
        }
    }

    println!();
    println!("{}", graph.health_check());
    Ok(())
}

fn print_tree(store: &ConceptStore, id: NodeId, depth: usize) {
    let node = &store[id];
    println!(
        "{}{} [{:?}, sentence {}]",
        "  ".repeat(depth),
        node.lemma,
        node.kind,
        node.sentence_index
    );
    for &child in &node.children {
        print_tree(store, child, depth + 1);
    }
}
