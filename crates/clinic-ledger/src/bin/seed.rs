//! # Cash Register Demo Data
//!
//! Runs a day at the register against a development database: two cashiers
//! open sessions, take service payments, pay a supplier and close, then a
//! supervisor voids one payment.
//!
//! ## Usage
//! ```bash
//! # Use the configured database (cash_register.toml / CLINIC_DATABASE_PATH)
//! cargo run -p clinic-ledger --bin seed
//!
//! # Specify database path
//! cargo run -p clinic-ledger --bin seed -- --db ./data/cash_register.db
//!
//! # Throwaway in-memory run
//! cargo run -p clinic-ledger --bin seed -- --db :memory:
//! ```

use std::env;
use std::path::PathBuf;

use clinic_core::{
    ensure_capability, Actor, BillableService, Capability, Money, PaymentMethod, ServicePaymentDetails,
    StaticActor, SupplierPaymentDetails,
};
use clinic_ledger::{init_tracing, CashRegister, LedgerConfig};

const SERVICES: &[(&str, &str, i64)] = &[
    ("svc-consult", "General consultation", 50_000),
    ("svc-lab", "Blood panel", 85_000),
    ("svc-xray", "Chest X-ray", 120_000),
    ("svc-vaccine", "Flu vaccine", 30_000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Clinic Cash Register Demo Data");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: from config)");
                println!("  -c, --config <PATH>  Config file path");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = LedgerConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    println!("Clinic Cash Register Demo Data");
    println!("==============================");
    println!("Database: {}", config.database.path.display());
    println!();

    let register = CashRegister::connect(config).await?;
    println!("✓ Connected to database");

    let alice = StaticActor::new("cashier-alice");
    let bob = StaticActor::new("cashier-bob");
    let supervisor = StaticActor::admin("supervisor-carol");

    for cashier in [&alice, &bob] {
        if let Some(open) = register.sessions().get_active_session(cashier.id()).await? {
            println!("⚠ {} still has session {} open, closing it", cashier.id(), open.id);
            let balance = register.sessions().get_current_balance(&open.id).await?;
            register
                .sessions()
                .force_close(&open.id, balance, &supervisor, "Left open by a previous demo run")
                .await?;
        }
    }

    let alice_session = register
        .sessions()
        .open(&alice, Money::from_major(200_000), Some("Front desk"))
        .await?;
    let bob_session = register
        .sessions()
        .open(&bob, Money::from_major(100_000), Some("Lab counter"))
        .await?;
    println!("✓ Opened sessions {} and {}", alice_session.id, bob_session.id);

    let mut voidable = None;
    for (idx, (id, name, price)) in SERVICES.iter().enumerate() {
        let cashier = if idx % 2 == 0 { &alice } else { &bob };
        let service = BillableService {
            id: id.to_string(),
            name: name.to_string(),
            price: Money::from_major(*price),
        };
        let method = PaymentMethod::ALL[idx % PaymentMethod::ALL.len()];

        let payment = register
            .payments()
            .process_service_payment(
                cashier,
                &service,
                service.price,
                ServicePaymentDetails {
                    payment_method: method,
                    patient_id: Some(format!("patient-{}", idx + 1)),
                    notes: None,
                },
            )
            .await?;
        println!("  {} paid {} by {}", name, payment.amount, method);

        if voidable.is_none() && cashier.id() == alice.id() {
            voidable = Some(payment.id);
        }
    }

    register
        .payments()
        .process_supplier_payment(
            &bob,
            Money::from_major(40_000),
            "Reagents for the lab",
            SupplierPaymentDetails {
                payment_method: PaymentMethod::Cash,
                category: Some("supplies".into()),
            },
        )
        .await?;
    println!("  Supplier paid {}", Money::from_major(40_000));

    for (cashier, session) in [(&alice, &alice_session), (&bob, &bob_session)] {
        let expected = register.sessions().get_current_balance(&session.id).await?;
        let closed = register
            .sessions()
            .close(cashier, &session.id, expected, None)
            .await?;
        println!(
            "✓ Closed {} (balance {}, difference {})",
            closed.id,
            closed.closing_balance.unwrap_or_default(),
            closed.difference.unwrap_or_default()
        );
    }

    if let Some(transaction_id) = voidable {
        ensure_capability(&supervisor, Capability::VoidTransactions)?;
        let voided = register
            .payments()
            .void_transaction(&transaction_id, "Charged to the wrong patient", &supervisor)
            .await?;
        println!("✓ Voided {} ({})", voided.id, voided.amount);
    }

    println!();
    for session in [&alice_session, &bob_session] {
        let summary = register.sessions().summary(&session.id).await?;
        println!("Session {} ({})", summary.session.id, summary.session.actor_id);
        println!("  Income:        {}", summary.totals.income);
        println!("  Expense:       {}", summary.totals.expense);
        println!("  Voided:        {}", summary.voided_count);
        println!("  Closing:       {}", summary.closing_balance.unwrap_or_default());
        println!("  Current:       {}", summary.current_balance);
        println!("  Drift:         {}", summary.post_close_drift.unwrap_or_default());
    }

    register.database().close().await;
    Ok(())
}
