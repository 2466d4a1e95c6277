//! Basic example of driving the simulation

use dualfall_core::{Outcome, Polarity, Simulation, SimulationConfig};

fn main() {
    let sim = match Simulation::new(SimulationConfig::compact()) {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("Invalid configuration: {}", err);
            return;
        }
    };

    println!("Starting grid:");
    println!("{}", sim.grid());

    // Place a T above the midline; it falls towards the polarity 1 mass
    let placed = match sim.place_figure("T", Polarity::One) {
        Ok(placed) => placed,
        Err(err) => {
            eprintln!("Could not place figure: {}", err);
            return;
        }
    };
    let shape = placed.shape;
    println!("Placed {}:", shape);
    println!("{}", placed.state.grid());

    // Try a rotation; a collision hands back the same state
    let mut state = placed.state;
    if let Ok(step) = state.rotate_cw(shape) {
        println!("Rotate clockwise: {:?}", step.outcome);
        state = step.state;
    }

    // Tick until the shape lands
    while state.groups().shape(shape).is_some() {
        let step = state.tick();
        if let Outcome::Conflict(cells) = &step.outcome {
            println!("Tick conflict on cells {:?}", cells);
            break;
        }
        state = step.state;
    }
    println!("After landing:");
    println!("{}", state.grid());

    // Spawn a mirrored figure for the other mass and drop it straight away
    if let Ok(placed) = state.place_figure("L", Polarity::Zero) {
        if let Ok(step) = placed.state.drop(placed.shape) {
            println!("Dropped {}:", placed.shape);
            println!("{}", step.state.grid());
            state = step.state;
        }
    }

    // Snapshots serialize the whole state
    let snapshot = state.snapshot();
    println!("Groups in snapshot: {}", snapshot.groups.len());
}
