use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use time::Date;
use tokio::sync::broadcast::error::TryRecvError;

use calorio_client::dates::{format_date, parse_date, today};
use calorio_client::dishes::{AddDishForm, DishCatalog, DishPatch, MealType, RecognizeDishFlow};
use calorio_client::goals::{ActivityLevel, Gender, GoalCalculator, GoalDraft, WeightGoal};
use calorio_client::summary::DayStats;
use calorio_client::subscription::PaymentIntent;
use calorio_client::{Calorio, ClientConfig, SessionEvent};

#[derive(Parser, Debug)]
#[command(name = "calorio", author, version, about = "Calorio nutrition tracker client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session tokens.
    Login { email: String },
    /// Create an account and log in.
    Register {
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
    },
    Logout,
    /// Show the current profile.
    Whoami,
    /// Check the backend health endpoint.
    Health,
    /// Goal, dishes and progress for a day (default: today).
    Day {
        #[arg(value_parser = parse_day)]
        date: Option<Date>,
    },
    /// List dishes, optionally for one day.
    Dishes {
        #[arg(long, value_parser = parse_day)]
        date: Option<Date>,
    },
    AddDish(AddDishArgs),
    /// Change fields of an existing dish.
    EditDish(EditDishArgs),
    DeleteDish { id: i64 },
    /// Estimate nutrition for a food by name.
    Lookup {
        name: String,
        #[arg(long, default_value_t = 100)]
        weight: u32,
    },
    /// Recognize dishes on a photo; with --meal every candidate is added.
    Recognize {
        file: PathBuf,
        #[arg(long, value_parser = parse_day)]
        date: Option<Date>,
        #[arg(long)]
        meal: Option<MealType>,
    },
    Goal {
        #[command(subcommand)]
        action: GoalCommand,
    },
    Subscription {
        #[command(subcommand)]
        action: Option<SubscriptionCommand>,
    },
}

#[derive(clap::Args, Debug)]
struct AddDishArgs {
    name: String,
    #[arg(long, default_value = "snack")]
    meal: MealType,
    #[arg(long, value_parser = parse_day)]
    date: Option<Date>,
    #[arg(long, default_value_t = 100)]
    weight: u32,
    #[arg(long)]
    calories: Option<f64>,
    #[arg(long)]
    proteins: Option<f64>,
    #[arg(long)]
    fats: Option<f64>,
    #[arg(long)]
    carbohydrates: Option<f64>,
    /// Fill in nutrition from the server before saving; explicit values win.
    #[arg(long)]
    lookup: bool,
}

#[derive(clap::Args, Debug)]
struct EditDishArgs {
    id: i64,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    weight: Option<u32>,
    #[arg(long)]
    calories: Option<f64>,
    #[arg(long)]
    proteins: Option<f64>,
    #[arg(long)]
    fats: Option<f64>,
    #[arg(long)]
    carbohydrates: Option<f64>,
    #[arg(long)]
    meal: Option<MealType>,
    #[arg(long, value_parser = parse_day)]
    date: Option<Date>,
}

#[derive(Subcommand, Debug)]
enum GoalCommand {
    Show {
        #[arg(value_parser = parse_day)]
        date: Option<Date>,
    },
    /// Compute daily targets from body parameters.
    Calculate {
        #[arg(long)]
        age: u32,
        #[arg(long)]
        weight: f64,
        #[arg(long)]
        height: u32,
        #[arg(long, default_value = "male")]
        gender: Gender,
        #[arg(long, default_value = "moderate")]
        activity: ActivityLevel,
        #[arg(long)]
        target: Option<WeightGoal>,
        #[arg(long, value_parser = parse_day)]
        date: Option<Date>,
        /// Save the result as the goal for the day.
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SubscriptionCommand {
    Status,
    Plans,
    Payments,
    PayMonthly {
        #[arg(long)]
        plan: Option<i64>,
    },
    PayYearly {
        #[arg(long)]
        plan: Option<i64>,
    },
    AutoRenew { state: Toggle },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
    On,
    Off,
}

fn parse_day(raw: &str) -> Result<Date, String> {
    parse_date(raw).map_err(|e| e.to_string())
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "calorio=info,calorio_client=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// `CALORIO_PASSWORD` if set, otherwise one line from stdin.
fn read_password() -> anyhow::Result<String> {
    if let Ok(p) = std::env::var("CALORIO_PASSWORD") {
        return Ok(p);
    }
    eprint!("Password: ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;
    let app = Calorio::from_config(&config)?;
    let mut events = app.session().subscribe();

    let result = run(&app, &config, cli.command).await;

    loop {
        match events.try_recv() {
            Ok(SessionEvent::LoginRequired { redirect_to }) => {
                eprintln!("Session expired. Log in again ({}): calorio login <email>", redirect_to);
            }
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }

    result
}

async fn run(app: &Calorio, config: &ClientConfig, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { email } => {
            let password = read_password()?;
            let res = app.auth.login(&email, &password).await?;
            println!("Logged in as {}", res.user.email);
        }
        Command::Register { email, first_name } => {
            let password = read_password()?;
            let res = app.auth.register(&first_name, &email, &password).await?;
            println!("Registered {} (id {})", res.user.email, res.user.id);
        }
        Command::Logout => {
            app.auth.logout().await?;
            println!("Logged out");
        }
        Command::Whoami => {
            let p = app.profile.get().await?;
            println!("{} <{}>", p.display_name(), p.email);
            if let (Some(age), Some(weight), Some(height)) = (p.age, p.weight, p.height) {
                println!("{} y, {} kg, {} cm", age, weight, height);
            }
        }
        Command::Health => {
            let h = app.health().await?;
            println!("{}", h.status);
            for (name, state) in &h.components {
                println!("  {}: {}", name, state);
            }
        }
        Command::Day { date } => {
            let day = app.days.get(date.unwrap_or_else(today)).await?;
            println!("{}", format_date(day.date));
            match &day.goal {
                Some(g) => println!(
                    "Goal: {:.0} kcal, P {} / F {} / C {}",
                    g.calories, g.proteins, g.fats, g.carbohydrates
                ),
                None => println!("No goal set"),
            }
            for meal in MealType::ALL {
                let dishes = day.meals.for_meal(meal);
                if dishes.is_empty() {
                    continue;
                }
                println!("{}:", meal);
                for d in dishes {
                    println!("  #{} {} {} g, {:.0} kcal", d.id, d.name, d.weight, d.calories);
                }
            }
            print!("{}", DayStats::from_day(&day));
        }
        Command::Dishes { date } => {
            let page = app.dishes.list(date).await?;
            for d in &page.results {
                println!(
                    "#{} {} {} g, {:.0} kcal, P {} F {} C {}",
                    d.id, d.name, d.weight, d.calories, d.proteins, d.fats, d.carbohydrates
                );
            }
            if page.has_more() {
                println!("({} total, more available)", page.count);
            }
        }
        Command::AddDish(args) => add_dish(app, config, args).await?,
        Command::EditDish(args) => {
            let patch = DishPatch {
                name: args.name,
                weight: args.weight,
                calories: args.calories,
                proteins: args.proteins,
                fats: args.fats,
                carbohydrates: args.carbohydrates,
                meal_type: args.meal,
                date: args.date,
            };
            let d = app.dishes.update(args.id, &patch).await?;
            println!("Updated #{} {}", d.id, d.name);
        }
        Command::DeleteDish { id } => {
            app.dishes.delete(id).await?;
            println!("Deleted #{}", id);
        }
        Command::Lookup { name, weight } => {
            let est = app.catalog().search_nutrition(&name, weight).await?;
            let m = est.macros();
            println!(
                "{} ({} g): {} kcal, P {} F {} C {}",
                name, weight, m.calories, m.proteins, m.fats, m.carbohydrates
            );
        }
        Command::Recognize { file, date, meal } => {
            let mut flow = RecognizeDishFlow::new(app.catalog(), date.unwrap_or_else(today));
            flow.select_file(&file).await?;
            let candidates = flow.recognize().await?.to_vec();
            if candidates.is_empty() {
                println!("Nothing recognized");
            }
            for (i, c) in candidates.iter().enumerate() {
                let confidence = c
                    .confidence_percent()
                    .map(|p| format!(" ({}%)", p))
                    .unwrap_or_default();
                println!(
                    "[{}] {}{}: {} g, {} kcal, P {} F {} C {}",
                    i, c.name, confidence, c.weight, c.calories, c.proteins, c.fats, c.carbohydrates
                );
            }
            if let Some(meal) = meal {
                let picks: Vec<_> = (0..candidates.len()).map(|i| (i, meal)).collect();
                for (i, outcome) in flow.add_candidates(&picks).await.into_iter().enumerate() {
                    match outcome {
                        Ok(d) => println!("Added [{}] as #{}", i, d.id),
                        Err(e) => eprintln!("Could not add [{}]: {}", i, e.user_message()),
                    }
                }
            }
        }
        Command::Goal { action } => goal(app, action).await?,
        Command::Subscription { action } => subscription(app, action).await?,
    }
    Ok(())
}

async fn add_dish(app: &Calorio, config: &ClientConfig, args: AddDishArgs) -> anyhow::Result<()> {
    let date = args.date.unwrap_or_else(today);
    let mut form = AddDishForm::new(app.catalog(), date, args.meal, config.lookup.clone());
    form.set_name(args.name);
    form.set_weight(args.weight);

    if args.lookup {
        if let Err(e) = form.lookup_now().await {
            eprintln!("Lookup failed: {}", e.user_message());
        }
    }
    if let Some(v) = args.calories {
        form.set_calories(v);
    }
    if let Some(v) = args.proteins {
        form.set_proteins(v);
    }
    if let Some(v) = args.fats {
        form.set_fats(v);
    }
    if let Some(v) = args.carbohydrates {
        form.set_carbohydrates(v);
    }

    let dish = form.submit().await?;
    println!(
        "Added #{} {} to {} on {}: {:.0} kcal",
        dish.id,
        dish.name,
        args.meal,
        format_date(date),
        dish.calories
    );
    Ok(())
}

async fn goal(app: &Calorio, action: GoalCommand) -> anyhow::Result<()> {
    match action {
        GoalCommand::Show { date } => {
            let date = date.unwrap_or_else(today);
            match app.goals.get(date).await? {
                Some(g) => println!(
                    "{}: {:.0} kcal, P {} / F {} / C {}{}",
                    format_date(date),
                    g.calories,
                    g.proteins,
                    g.fats,
                    g.carbohydrates,
                    if g.is_auto_calculated { " (auto)" } else { "" }
                ),
                None => println!("No goal for {}", format_date(date)),
            }
        }
        GoalCommand::Calculate {
            age,
            weight,
            height,
            gender,
            activity,
            target,
            date,
            apply,
        } => {
            let mut calc = GoalCalculator::new(app.planner(), date.unwrap_or_else(today));
            if let Some(draft) = calc.draft_mut() {
                *draft = GoalDraft {
                    age: Some(age),
                    gender,
                    weight: Some(weight),
                    height: Some(height),
                    activity_level: activity,
                    goal: target,
                };
            }
            let g = calc.calculate().await?;
            println!(
                "{:.0} kcal, P {} / F {} / C {}",
                g.calories, g.proteins, g.fats, g.carbohydrates
            );
            if apply {
                calc.apply().await?;
                println!("Goal saved");
            }
        }
    }
    Ok(())
}

async fn subscription(app: &Calorio, action: Option<SubscriptionCommand>) -> anyhow::Result<()> {
    let api = &app.subscription;
    match action.unwrap_or(SubscriptionCommand::Status) {
        SubscriptionCommand::Status => {
            let s = api.get().await?;
            println!(
                "{}: {:?}, auto-renew {}",
                s.plan_name.as_deref().unwrap_or("no plan"),
                s.status,
                if s.auto_renew { "on" } else { "off" }
            );
            if let Some(days) = s.days_remaining {
                println!("{} days remaining", days);
            }
        }
        SubscriptionCommand::Plans => {
            for p in api.plans().await?.results {
                println!(
                    "#{} {}: {:.2}/month, {:.2}/year",
                    p.id, p.name, p.price_monthly, p.price_yearly
                );
            }
        }
        SubscriptionCommand::Payments => {
            let page = api.payments().await?;
            for p in &page.results {
                println!(
                    "#{} {} {:?} {:?}",
                    p.id,
                    p.amount.map(|a| format!("{:.2}", a)).unwrap_or_default(),
                    p.payment_type,
                    p.status
                );
            }
        }
        SubscriptionCommand::PayMonthly { plan } => print_intent(api.pay_monthly(plan).await?),
        SubscriptionCommand::PayYearly { plan } => print_intent(api.pay_yearly(plan).await?),
        SubscriptionCommand::AutoRenew { state } => {
            let res = match state {
                Toggle::On => api.enable_auto_renew().await?,
                Toggle::Off => api.disable_auto_renew().await?,
            };
            println!("{}", res.detail);
        }
    }
    Ok(())
}

fn print_intent(intent: PaymentIntent) {
    println!("Payment #{}: {:.2} ({:?})", intent.payment_id, intent.amount, intent.status);
    if let Some(url) = intent.payment_url {
        println!("Pay at {}", url);
    }
}
