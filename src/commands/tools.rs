use marquee::types::{StrategyFamily, StrategyKind, ToolInfo};

pub fn show_tools() {
    println!("\nAvailable strategies:\n");
    for tool in StrategyKind::ALL.into_iter().map(ToolInfo::from) {
        let family = match tool.family {
            StrategyFamily::BroadRecall => "broad recall",
            StrategyFamily::Filter => "filter",
        };
        println!("  {} ({})", tool.name, family);
        println!("      {}", tool.description);
    }
    println!();
}
