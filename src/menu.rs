use std::io::{self, Write};

pub fn show_menu() {
    println!("\n===========================================");
    println!("Gear-Motor Closed-Loop Controller");
    println!("===========================================");
    println!("Select an option:");
    println!("1. Set-Position Demo (threaded, quarter turns)");
    println!("2. Set-Speed Demo (async, +/-2 turns/s)");
    println!("3. Scheduler Comparison (threaded vs async)");
    println!("4. Exit");
    println!("===========================================");
    print!("Choice (1-4): ");
    let _ = io::stdout().flush();
}

pub fn get_user_choice() -> Result<u32, Box<dyn std::error::Error>> {
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().parse::<u32>()?)
}

pub fn wait_for_enter() {
    println!("\nPress Enter to return to menu...");
    let mut input = String::new();
    let _ = io::stdin().read_line(&mut input);
}
