//! Print the nutrition report for a barcode
//! Usage: cargo run --bin nutrition_report -- <barcode> [--count N] [--type NAME]

use nutriscan::config::Config;
use nutriscan::external::{LookupError, OpenFoodFactsClient, ProductLookup};
use nutriscan::models::{ComponentKind, NutritionReport, ObjectCount};
use nutriscan::nutrition::normalize;

struct Args {
    barcode: String,
    object_count: Option<ObjectCount>,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut barcode = None;
    let mut count = None;
    let mut object_type = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--count" => {
                let value = iter.next().ok_or("--count needs a value")?;
                count = Some(value.parse::<u32>().map_err(|_| format!("Invalid count: {}", value))?);
            }
            "--type" => object_type = Some(iter.next().ok_or("--type needs a value")?.clone()),
            other if barcode.is_none() => barcode = Some(other.to_string()),
            other => return Err(format!("Unexpected argument: {}", other)),
        }
    }

    Ok(Args {
        barcode: barcode.ok_or("Usage: nutrition_report <barcode> [--count N] [--type NAME]")?,
        object_count: count.map(|count| ObjectCount {
            object_type: object_type.unwrap_or_else(|| "item".to_string()),
            count,
        }),
    })
}

fn print_report(barcode: &str, report: &NutritionReport) {
    println!("{} ({})", report.product_name, barcode);
    println!("Nutrition Grade: {}", report.nutrition_grade);
    if let Some(count) = &report.object_count {
        println!("Detected: {} x {}", count.count, count.object_type);
    }

    println!("\nNutrition Facts (per 100g)");
    println!("{:<32} {:>10}  {}", "Nutrient", "Value", "Unit");
    for row in &report.nutrient_rows {
        println!("{:<32} {:>10.2}  {}", row.name, row.value_per_100g, row.unit);
    }

    let opt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
    println!("\nNutri-Score Components");
    println!("{:<24} {:>8} {:<6} {:>6} {:>10}  {}", "Component", "Value", "Unit", "Points", "Max Points", "Type");
    for kind in [ComponentKind::Negative, ComponentKind::Positive] {
        for row in report.rows_of_kind(kind) {
            println!(
                "{:<24} {:>8} {:<6} {:>6} {:>10}  {}",
                row.component,
                opt(row.value),
                row.unit.as_deref().unwrap_or(""),
                opt(row.points),
                opt(row.points_max),
                row.kind
            );
        }
    }

    let summary = &report.summary;
    println!("\nSummary");
    println!("  Positive Points: {}", summary.positive_points);
    println!("  Negative Points: {}", summary.negative_points);
    println!("  Final Score:     {}", summary.final_score);
    println!("  Verdict:         {}", if summary.is_healthy { "Healthy" } else { "Unhealthy" });

    for issue in &report.issues {
        println!("  Note: {}", issue);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&args)?;

    let config = Config::from_env();
    let client = OpenFoodFactsClient::from_config(&config)?;

    match client.fetch_product(&args.barcode) {
        Ok(product) => {
            let report = normalize(&product, args.object_count);
            print_report(&args.barcode, &report);
        }
        Err(LookupError::NotFound(barcode)) => println!("Product not found: {}", barcode),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
