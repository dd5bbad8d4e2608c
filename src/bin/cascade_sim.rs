use clap::Parser;
use log::error;
use match3_engine::config::{SessionConfig, Timings};
use match3_engine::engine::Position;
use match3_engine::session::Session;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Simulate random play on seeded boards", long_about = None)]
struct Args {
    /// Number of boards to simulate
    #[clap(short, long, default_value_t = 20)]
    boards: usize,

    /// Random swaps attempted on each board
    #[clap(short, long, default_value_t = 50)]
    moves: usize,

    /// Seed of the first board; board i uses seed + i
    #[clap(short, long, default_value_t = 0)]
    seed: u64,

    /// Width and height of the board
    #[clap(long, default_value_t = 8)]
    size: usize,
}

#[derive(Debug, Default)]
struct BoardResult {
    score: u32,
    reverted: usize,
    longest_cascade: u32,
}

/// Picks a random cell and a random in-bounds neighbour of it.
fn random_adjacent_pair(rng: &mut SmallRng, size: usize) -> (Position, Position) {
    loop {
        let from = Position::new(rng.gen_range(0..size), rng.gen_range(0..size));
        let (dr, dc) = [(-1, 0), (1, 0), (0, -1), (0, 1)][rng.gen_range(0..4)];
        let row = from.row as isize + dr;
        let col = from.col as isize + dc;
        if row >= 0 && col >= 0 && (row as usize) < size && (col as usize) < size {
            return (from, Position::new(row as usize, col as usize));
        }
    }
}

fn simulate_board(config: SessionConfig, seed: u64, moves: usize) -> anyhow::Result<BoardResult> {
    let mut session = Session::with_seed(config, seed);
    let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(0x9e37_79b9));
    let mut result = BoardResult::default();

    for _ in 0..moves {
        let (first, second) = random_adjacent_pair(&mut rng, config.grid_size);
        session.select(first)?;
        session.select(second)?;
        session.run_until_idle()?;

        let cascade = session.last_cascade();
        if cascade.passes == 0 {
            result.reverted += 1;
        }
        result.longest_cascade = result.longest_cascade.max(cascade.passes);

        if session.grid().has_any_match() {
            error!("Board (seed {}) settled with a match left:\n{}", seed, session.grid());
        }
    }

    result.score = session.score();
    Ok(result)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_target(false)
        .init();

    let args = Args::parse();
    if args.size < 2 {
        anyhow::bail!("Board size must be at least 2, got {}", args.size);
    }
    let config = SessionConfig::default()
        .with_grid_size(args.size)
        .with_timings(Timings::instant());

    println!(
        "Simulating {} boards ({}x{}), {} random swaps each...",
        args.boards, args.size, args.size, args.moves
    );

    let mut total_score: u64 = 0;
    let mut total_reverted = 0;
    let mut longest_cascade = 0;

    for board_idx in 0..args.boards {
        let seed = args.seed + board_idx as u64;
        let result = simulate_board(config, seed, args.moves)?;
        println!(
            "  Board {:<3} (Seed: {:<4}) Score: {:<6} Reverted: {:<4} Longest cascade: {}",
            board_idx, seed, result.score, result.reverted, result.longest_cascade
        );
        total_score += u64::from(result.score);
        total_reverted += result.reverted;
        longest_cascade = longest_cascade.max(result.longest_cascade);
    }

    println!("\n--- Simulation Complete ---");
    if args.boards > 0 {
        let attempted = (args.boards * args.moves).max(1);
        println!(
            "Average score: {:.2}",
            total_score as f64 / args.boards as f64
        );
        println!(
            "Reverted swaps: {} of {} ({:.1}%)",
            total_reverted,
            attempted,
            100.0 * total_reverted as f64 / attempted as f64
        );
        println!("Longest cascade: {} pass(es)", longest_cascade);
    }
    Ok(())
}
