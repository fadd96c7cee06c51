use dotenvy::dotenv;
use shadoron_finance::database::db::{connection::get_db_pool, migrate, queries};
use shadoron_finance::database::models::PendingOp;
use shadoron_finance::export::ExportDocument;
use shadoron_finance::sync::OfflineQueue;
use shadoron_finance::FinanceService;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

/// End-to-end run against a real database file. Uses `SMOKE_DATABASE_URL`
/// when set, otherwise a throwaway file in the temp directory.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    /* ==========Testing========== */
    let db_url = match std::env::var("SMOKE_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            let path = std::env::temp_dir().join("shadoron_smoke.db");
            let _ = std::fs::remove_file(&path);
            format!("sqlite://{}?mode=rwc", path.display())
        }
    };
    println!("Using {db_url}");

    let pool = get_db_pool(&db_url).await?;
    migrate::run_migrations(&pool).await?;
    println!("Migrations ran successfully!");
    pool.close().await;

    let service = FinanceService::open(&db_url).await?;
    let dec = |s: &str| Decimal::from_str(s);

    // ----------------------------------------------------
    // TEST：INCOME SPLIT
    // ----------------------------------------------------
    println!("\n--- Testing: record_income ---");
    let income = service.record_income(dec("1234.56")?, Some("salary".into())).await?;
    println!("   > Income recorded {}", income.transaction.id);
    for a in &income.transaction.allocations {
        println!("     {:<10} {}", a.category, a.amount);
    }
    let balances = service.balances().await?;
    let drift = (balances.total() - dec("1234.56")?).abs();
    assert!(drift <= dec("0.03")?, "allocations drifted by {drift}");

    // ----------------------------------------------------
    // TEST：EXPENSE AND DELETE
    // ----------------------------------------------------
    println!("\n--- Testing: record_expense / delete_transaction ---");
    let before = service.balances().await?.get("food");
    let expense = service.record_expense("food", dec("42.10")?, None).await?;
    assert_eq!(service.balances().await?.get("food"), before - dec("42.10")?);
    service.delete_transaction(expense.id).await?;
    assert_eq!(service.balances().await?.get("food"), before, "delete did not reverse the expense");
    println!("   > Expense reversed, food back to {before}");

    // ----------------------------------------------------
    // TEST：REBALANCE
    // ----------------------------------------------------
    println!("\n--- Testing: rebalance_category ---");
    let categories = service.rebalance_category("leisure", dec("5")?).await?;
    let total: Decimal = categories.iter().map(|c| c.percent).sum();
    println!("   > Weights now sum to {total}");
    assert_eq!(total, Decimal::ONE_HUNDRED);

    // ----------------------------------------------------
    // TEST：GAMIFICATION
    // ----------------------------------------------------
    println!("\n--- Testing: gamification ---");
    let game = service.gamification().await?;
    println!("   > XP {} rank {} streak {}", game.xp, game.rank().name, game.streak.current);
    assert!(game.xp > 0, "no XP after recording income");

    // ----------------------------------------------------
    // TEST：GOALS AND DEBTS
    // ----------------------------------------------------
    println!("\n--- Testing: goals / debts ---");
    let deadline = NaiveDate::from_ymd_opt(2030, 1, 1);
    let goal = service.create_goal("Emergency fund", dec("3000")?, deadline).await?;
    let goal = service.contribute_goal(goal.id, dec("750")?).await?;
    println!("   > Goal at {}%", goal.progress_percent());
    assert_eq!(goal.progress_percent(), 25);

    let debt = service.create_debt("Laptop", dec("1200")?, dec("12")?, dec("100")?).await?;
    let (debt, applied) = service.pay_debt(debt.id, dec("2000")?).await?;
    println!("   > Applied {applied}, remaining {}", debt.remaining);
    assert_eq!(applied, dec("1200")?);
    assert!(debt.is_paid_off());

    // ----------------------------------------------------
    // TEST：EXPORT / IMPORT
    // ----------------------------------------------------
    println!("\n--- Testing: export / import ---");
    let doc = service.export().await?;
    let text = doc.to_json_pretty()?;
    let parsed = ExportDocument::parse(&text)?;
    service.import(parsed).await?;
    assert_eq!(service.balances().await?, doc.balances, "import changed the balances");
    assert_eq!(service.history(None).await?.len(), doc.history.len());
    println!("   > {} bytes exported and re-imported", text.len());

    // ----------------------------------------------------
    // TEST：OFFLINE QUEUE
    // ----------------------------------------------------
    println!("\n--- Testing: offline queue ---");
    let queue = OfflineQueue::new(service.pool().clone(), 3);
    let seq = queue
        .enqueue(&PendingOp::DeleteTransaction { id: income.transaction.id })
        .await?;
    assert_eq!(queue.pending().await?, 1);
    let mut conn = service.pool().acquire().await?;
    assert!(queries::remove_op(&mut conn, seq).await?);
    drop(conn);
    assert_eq!(queue.pending().await?, 0);
    println!("   > Queue entry {seq} stored and removed");

    println!("\nAll smoke checks passed.");
    Ok(())
}
