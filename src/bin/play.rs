use anyhow::Context;
use clap::Parser;
use match3_engine::config::SessionConfig;
use match3_engine::engine::Position;
use match3_engine::session::{SelectOutcome, Session, Snapshot};
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Play match-3 in the terminal", long_about = None)]
struct Args {
    /// Seed for board generation and refills (random if omitted)
    #[clap(short, long)]
    seed: Option<u64>,

    /// Width and height of the board
    #[clap(long, default_value_t = 8)]
    size: usize,

    /// Play cascades back in real time, printing every intermediate board
    #[clap(short, long)]
    animate: bool,
}

fn print_status(snapshot: &Snapshot) {
    println!("---------------------");
    println!("Moves: {}, Score: {}", snapshot.moves, snapshot.score);
    println!("{}", snapshot.grid.to_string_with_highlight(snapshot.selection));
}

fn print_frame(snapshot: &Snapshot) {
    println!();
    if !snapshot.clearing.is_empty() {
        println!("Clearing {} token(s)", snapshot.clearing.len());
    } else if !snapshot.falling.is_empty() {
        println!("{} token(s) falling", snapshot.falling.len());
    }
    println!("{}", snapshot.grid);
}

/// Drives the session until its input lock is released.
fn finish_move(session: &mut Session, animate: bool) -> anyhow::Result<()> {
    if animate {
        while let Some(due_in) = session.next_due_in() {
            thread::sleep(Duration::from_millis(due_in));
            session.advance(due_in);
            print_frame(&session.snapshot());
        }
    } else {
        session.run_until_idle()?;
    }

    let cascade = session.last_cascade();
    if cascade.passes == 0 {
        println!("No match, swap reverted.");
    } else {
        println!(
            "Cleared {} token(s) in {} pass(es).",
            cascade.cleared, cascade.passes
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_target(false)
        .init();

    let args = Args::parse();
    let config = SessionConfig::default().with_grid_size(args.size);
    let mut session = match args.seed {
        Some(seed) => Session::with_seed(config, seed),
        None => Session::new(config),
    };
    println!("Welcome to Match-3!");

    loop {
        print_status(&session.snapshot());

        print!("Enter a cell (row col), 'r' to reset, 'q' to quit: ");
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut input = String::new();
        if io::stdin()
            .read_line(&mut input)
            .context("Failed to read input")?
            == 0
        {
            break;
        }

        let trimmed_input = input.trim();
        match trimmed_input {
            "q" => {
                println!("Thanks for playing!");
                break;
            }
            "r" => {
                session.reset();
                println!("New game started.");
                continue;
            }
            _ => {}
        }

        let parts: Vec<&str> = trimmed_input.split_whitespace().collect();
        let [row, col] = parts.as_slice() else {
            println!("Invalid input format. Use 'row col', 'r', or 'q'.");
            continue;
        };
        let (Ok(row), Ok(col)) = (row.parse::<usize>(), col.parse::<usize>()) else {
            println!("Invalid input: Please enter numbers for row and column (e.g., '3 4').");
            continue;
        };

        match session.select(Position::new(row, col)) {
            Ok(SelectOutcome::SwapStarted) => finish_move(&mut session, args.animate)?,
            Ok(SelectOutcome::Selected) => println!("Selected ({}, {}).", row, col),
            Ok(SelectOutcome::Deselected) => println!("Selection cleared."),
            Ok(SelectOutcome::Ignored) => println!("Board is busy, try again."),
            Err(e) => println!("Invalid coordinates: {}", e),
        }
    }

    Ok(())
}
