// Demonstration: generate BCCSP instances, optionally train the linear policy,
// and evaluate a policy with greedy rollouts.
//
// Build/run from this repo root:
//   cargo run --example rollout_demo -- --policy linear --episodes 64 --train 200
//   cargo run --example rollout_demo -- --policy greedy --data networks.jsonl

use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::process;

use covroute::algorithms::rl::{
    EvaluationMetrics, GainDensityPolicy, LinearPolicy, Policy, RLConfig, RandomPolicy, Trainer,
    TrainingConfig,
};
use covroute::algorithms::{PolicyRouter, RoutingAlgorithm};
use covroute::instance::{
    load_jsonl, write_jsonl, DemoSource, Instance, InstanceRecord, SynthConfig,
    SyntheticGenerator,
};
use covroute::RouterError;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run() {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), RouterError> {
    let args: Vec<String> = env::args().collect();
    let policy_name = arg_value(&args, "--policy").unwrap_or("greedy");
    let episodes: usize = arg_value(&args, "--episodes")
        .and_then(|s| s.parse().ok())
        .unwrap_or(32);
    let nodes: usize = arg_value(&args, "--nodes")
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);
    let seed: u64 = arg_value(&args, "--seed")
        .and_then(|s| s.parse().ok())
        .unwrap_or(42);
    let train_iters: usize = arg_value(&args, "--train")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let rl_config = RLConfig::default();
    let train_config = TrainingConfig::default();
    let synth = SynthConfig {
        n_nodes: nodes,
        ..SynthConfig::default()
    };
    let mut generator = SyntheticGenerator::new(synth, seed);

    let instances: Vec<Instance> = match arg_value(&args, "--data") {
        Some(path) => load_jsonl(path)?
            .iter()
            .map(InstanceRecord::to_instance)
            .collect::<Result<_, _>>()?,
        None => (0..episodes)
            .map(|_| generator.instance())
            .collect::<Result<_, _>>()?,
    };

    if let Some(path) = arg_value(&args, "--write") {
        let records: Vec<InstanceRecord> = instances
            .iter()
            .map(|inst| InstanceRecord::from_instance(inst, None, DemoSource::Heuristic))
            .collect();
        write_jsonl(BufWriter::new(File::create(path)?), &records)?;
        println!("Wrote {} records to {}", records.len(), path);
    }

    let mut policy: Box<dyn Policy> = match policy_name {
        "random" => Box::new(RandomPolicy::new(seed)),
        "greedy" => Box::new(GainDensityPolicy::default()),
        "linear" => {
            let mut trainer = Trainer::new(
                LinearPolicy::default(),
                rl_config.clone(),
                TrainingConfig {
                    learning_rate: 1e-2,
                    ..train_config.clone()
                },
            );
            if train_iters > 0 {
                let mut rng = StdRng::seed_from_u64(seed);
                trainer.fit_reinforce(&mut generator, train_iters, &mut rng)?;
            }
            Box::new(trainer.policy)
        }
        other => {
            eprintln!(
                "Unknown --policy '{}'; expected 'greedy', 'random', or 'linear'.",
                other
            );
            process::exit(2);
        }
    };

    // A single instance may not share its node count with the rest of a dataset.
    if instances.windows(2).all(|w| w[0].n_nodes() == w[1].n_nodes()) {
        let metrics =
            EvaluationMetrics::evaluate(&instances, policy.as_mut(), &rl_config, &train_config)?;
        println!("Policy: {}", policy.name());
        println!("{}", metrics);
    }

    if let Some(first) = instances.first() {
        let mut router = PolicyRouter::new(GainDensityPolicy::default());
        println!("Sample route: {}", router.route(first)?);
    }
    Ok(())
}

fn arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}
