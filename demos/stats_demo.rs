use clap::Parser;
use open_hash::Config;
use open_hash::HashMap;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    #[arg(short = 'l', long = "load_factor", default_value_t = 0.75)]
    load_factor: f32,
}

fn main() {
    let args = Args::parse();

    let mut words: HashMap<String, String> = HashMap::new();
    *words.get_or_insert_default(String::new()) = "test".to_string();
    *words.get_or_insert_default("test".to_string()) = "test".to_string();
    words.get_or_insert_default("test1".to_string());
    println!("{words:?}");
    println!(
        "at(\"\") = {:?}, at(\"missing\") = {:?}",
        words.at(""),
        words.at("missing")
    );
    words.clear();
    println!(
        "after clear: len {} capacity {}",
        words.len(),
        words.capacity()
    );

    println!(
        "Creating HashMap with target capacity {} at load factor {}",
        args.target_capacity, args.load_factor
    );

    let config = Config::new()
        .expected(args.target_capacity)
        .load_factor(args.load_factor);
    let mut map: HashMap<u64, u64> = match HashMap::try_with_config(config) {
        Ok(map) => map,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            std::process::exit(2);
        }
    };

    println!("Actual capacity: {}", map.capacity());
    println!("Filling map up to its growth threshold...");

    let capacity = map.capacity();
    let num_values = map.growth_threshold() as u64;
    for value in 0..num_values {
        if let Err(err) = map.try_insert(value, value) {
            eprintln!("insert of {value} failed: {err}");
            break;
        }
    }

    println!("Inserted {} values into map", map.len());
    println!(
        "Final load factor: {:.2}%",
        map.debug_stats().slot_utilization * 100.0
    );
    assert_eq!(capacity, map.capacity());

    map.probe_histogram().print();
    map.debug_stats().print();
}
