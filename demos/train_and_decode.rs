use forest_crf::train::CrfTrainer;
use forest_crf::{DecoderParams, Example, Forest, Model, Node, Rule, SparseFeaturizer};

/// Two-word sentence pair whose gold translation swaps the words
fn example(id: &str, first: &str, second: &str) -> Result<Example, forest_crf::Error> {
    let source = vec![first.to_string(), second.to_string()];
    let top = Node::nonterminal("START");
    let s = Node::nonterminal("S").with_source(0, 2);
    let a = Node::nonterminal("T").with_source(0, 1);
    let b = Node::nonterminal("T").with_source(1, 2);
    let word = |w: &str, i: u32| Node::terminal(w.to_uppercase()).with_source(i, i + 1);

    let all = Forest::from_rules(
        format!("{}-all", id),
        vec![
            Rule::unary(top.clone(), s.clone()),
            Rule::binary(s.clone(), a.clone(), b.clone()),
            Rule::inverted(s.clone(), b.clone(), a.clone()),
            Rule::unary(a.clone(), word(first, 0)),
            Rule::unary(b.clone(), word(second, 1)),
        ],
    )?;
    let gold = Forest::from_rules(
        format!("{}-gold", id),
        vec![
            Rule::unary(top, s.clone()),
            Rule::inverted(s, b.clone(), a.clone()),
            Rule::unary(a, word(first, 0)),
            Rule::unary(b, word(second, 1)),
        ],
    )?;
    Ok(Example::featurize(id, source, all, gold, &SparseFeaturizer::new()))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Forest CRF Training and Decoding Example");
    println!("========================================\n");

    let examples = vec![
        example("0", "red", "car")?,
        example("1", "big", "house")?,
        example("2", "old", "man")?,
    ];
    println!("Training data: {} sentence pairs\n", examples.len());

    // Create and configure trainer
    let mut trainer = CrfTrainer::new().with_seed(42);
    trainer.verbose(true);
    trainer.set("learning_rate", "0.5")?;
    trainer.set("batch_size", "2")?;
    trainer.set("max_epochs", "10")?;
    println!("Setting parameters:");
    println!("  learning rate: {}", trainer.get("learning_rate")?);
    println!("  batch size: {}", trainer.get("batch_size")?);
    println!("  max epochs: {}\n", trainer.get("max_epochs")?);

    let report = trainer.fit(&examples);
    println!("\n{:?}\n", report);

    let model_path = std::env::temp_dir().join("example_model.hcrf");
    trainer.save_model(&model_path)?;

    // Load model and decode
    let model_data = std::fs::read(&model_path)?;
    let model = Model::new(&model_data)?;
    let mut translator = model.translator(DecoderParams::default());

    let test = example("test", "blue", "sky")?;
    let viterbi = translator.viterbi(test.decode_instance())?;
    let mbr = translator.mbr(test.decode_instance())?;
    println!("Input: blue sky");
    println!("  Viterbi: {:?}", viterbi.map(|out| out.tokens));
    println!("  MBR:     {:?}", mbr.map(|out| out.tokens));

    Ok(())
}
