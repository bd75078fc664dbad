//! Prompt templates keyed by module slug
//!
//! Every template starts with the user's answers joined by blank lines and
//! ends with the JSON shape the model must return.

use spz_common::db::{CAPABILITIES_INVENTORY_SLUG, FINAL_REPORT_SLUG};

/// Stand-in used when a module has no non-empty answers
pub const NO_RESPONSES_PLACEHOLDER: &str = "No responses provided yet.";

pub const STRATEGY_FRAMEWORK_SLUG: &str = "strategy-framework";
const OPPORTUNITY_MAP_SLUG: &str = "opportunity-map";
const SERVICE_OFFERING_SLUG: &str = "service-offering";
const POSITIONING_SLUG: &str = "positioning";
const PRICING_SLUG: &str = "pricing";

/// Whether the selected practice is fed into this module's prompt
pub fn uses_practice_context(slug: &str) -> bool {
    slug == CAPABILITIES_INVENTORY_SLUG || slug == STRATEGY_FRAMEWORK_SLUG
}

/// Build the generation prompt for `slug`
///
/// `answers` are expected trimmed; empty entries are dropped. `practice` is
/// only honored for modules where [`uses_practice_context`] holds.
pub fn build_prompt(slug: &str, answers: &[String], practice: Option<&str>) -> String {
    let mut kept: Vec<&str> = answers
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();
    if kept.is_empty() {
        kept.push(NO_RESPONSES_PLACEHOLDER);
    }
    let joined = kept.join("\n\n");
    let practice = practice.map(str::trim).filter(|p| !p.is_empty());

    match slug {
        CAPABILITIES_INVENTORY_SLUG => match practice {
            Some(p) => capabilities_with_practice(&joined, p),
            None => capabilities_without_practice(&joined),
        },
        STRATEGY_FRAMEWORK_SLUG => strategy_framework(&joined, practice),
        OPPORTUNITY_MAP_SLUG => answers_header(&joined) + OPPORTUNITY_MAP_SHAPE,
        SERVICE_OFFERING_SLUG => answers_header(&joined) + SERVICE_OFFERING_SHAPE,
        POSITIONING_SLUG => answers_header(&joined) + POSITIONING_SHAPE,
        PRICING_SLUG => format!(
            "You are an AI. The user has completed the \"Pricing Strategy Planner\" module with these answers:\n{}\n{}",
            joined, PRICING_SHAPE
        ),
        FINAL_REPORT_SLUG => format!(
            "You are an AI. The user has completed all modules, and these are their answers from all previous modules:\n{}\n{}",
            joined, FINAL_REPORT_SHAPE
        ),
        other => format!(
            "{}\nGenerate a JSON analysis based on the responses for the module \"{}\".\n\
             Provide relevant insights in a structured format appropriate to the module's purpose.\n\
             If no specific module is identified, provide a general summary of the responses.\n",
            answers_header(&joined),
            if other.is_empty() { "unknown" } else { other }
        ),
    }
}

fn answers_header(joined: &str) -> String {
    format!("You are an AI. The user provided these answers:\n{}\n", joined)
}

fn capabilities_without_practice(joined: &str) -> String {
    answers_header(joined)
        + r#"
Generate a JSON with:
"practices": an array of exactly 5 consulting practice types that best suit their capabilities
"niches": an empty array for now (we'll fill this later when they select a practice)

Example format:
{
"practices": ["Practice 1", "Practice 2", "Practice 3", "Practice 4", "Practice 5"],
"niches": []
}
"#
}

fn capabilities_with_practice(joined: &str, practice: &str) -> String {
    format!(
        "{header}\nThe user has selected \"{p}\" as their consulting practice.\n\n\
         Generate a JSON with:\n\
         \"practices\": an array with just the selected practice\n\
         \"niches\": an array of 5 specific niche options within \"{p}\" that the user may want to consider\n\n\
         Example format:\n\
         {{\n\"practices\": [\"{p}\"],\n\"niches\": [\"Niche 1\", \"Niche 2\", \"Niche 3\", \"Niche 4\", \"Niche 5\"]\n}}\n",
        header = answers_header(joined),
        p = practice
    )
}

fn strategy_framework(joined: &str, practice: Option<&str>) -> String {
    let mut prompt = answers_header(joined);
    if let Some(p) = practice {
        prompt.push_str(&format!(
            "\nThe user's selected consulting practice is \"{}\". Tailor every item to it.\n",
            p
        ));
    }
    prompt.push_str(STRATEGY_FRAMEWORK_SHAPE);
    prompt
}

const STRATEGY_FRAMEWORK_SHAPE: &str = r#"
Generate a JSON with:
{
"valuePropositions": [
"Example Value Proposition #1",
"Example Value Proposition #2",
"Example Value Proposition #3",
"Example Value Proposition #4",
"Example Value Proposition #5"
],
"targetIndustries": [
"Industry #1",
"Industry #2",
"Industry #3",
"Industry #4",
"Industry #5"
],
"idealClients": [
"Detailed Ideal Client #1 - include characteristics, challenges, and decision-making profile",
"Detailed Ideal Client #2 ...",
"Detailed Ideal Client #3 ...",
"Detailed Ideal Client #4 ...",
"Detailed Ideal Client #5 ..."
]
}

Ensure there are exactly 5 items in each array, describing each in detail.
"#;

const OPPORTUNITY_MAP_SHAPE: &str = r#"
Generate a JSON object with two arrays:
{
"opportunityMapServices": [
  {
    "serviceName": "Service 1",
    "topIndustries": ["Industry A", "Industry B", "Industry C", "Industry D", "Industry E"],
    "whyGoodTarget": ["Reason 1 for Industry A", "Reason 2", "Reason 3", "Reason 4", "Reason 5"],
    "risks": ["Potential Risk 1", "Potential Risk 2", "Potential Risk 3", "Potential Risk 4", "Potential Risk 5"]
  }
],
"opportunityMapIndustries": [
  {
    "industryName": "Industry A",
    "services": ["Service 1", "Service 2", "Service 3"],
    "whyServiceFits": ["Reason 1", "Reason 2", "Reason 3"],
    "risks": ["Risk 1", "Risk 2", "Risk 3"]
  }
]
}

Each array should have at least 2 objects, each with top five industries or services, reasons, and risks, based on the user's responses.
"#;

const SERVICE_OFFERING_SHAPE: &str = r#"
Generate a JSON object with a "serviceTiers" array. Exactly 3 items (Basic, Mid-Level, Premium).
Each item in "serviceTiers" must have:
{
  "name": "Basic" (or "Mid-Level" or "Premium"),
  "features": "The key features and benefits of this tier",
  "outcomes": "The client outcomes this tier should produce",
  "intangibleBenefits": "Any intangible or non-obvious benefits for this tier"
}
"#;

const POSITIONING_SHAPE: &str = r#"
Generate a JSON object with the following structure:
{
"topNiches": [
  { "niche": "Niche 1", "positioning": "Explanation of how to stand out in Niche 1" }
],
"risksObstacles": ["Risk or obstacle #1"],
"strategies": ["Actionable Strategy #1 (very specific steps)"],
"opportunityMatrix": [
  {
    "service": "Service name 1",
    "segment": "Potential client segment",
    "demand": "High/Medium/Low",
    "easeOfEntry": "High/Medium/Low",
    "profitability": "High/Medium/Low",
    "risks": ["Risk A", "Risk B"],
    "recommendedStrategies": ["Strategy A", "Strategy B"]
  }
]
}

Ensure exactly 5 top niches, 5 risks or obstacles and 5 strategies.
"risksObstacles" should reflect obstacles or limitations the user might face.
"strategies" must be extremely specific and actionable, providing direct steps or recommendations the user can implement.
"opportunityMatrix" shows how each service intersects with potential client segments (demand, entry, profitability), plus potential risks and recommended strategies.
"#;

const PRICING_SHAPE: &str = r#"
Generate a JSON object with the following fields based on the user's responses:
{
"marketRates": "Typical market rates for each service you plan to provide",
"justification": "The justification for the pricing and Return-On-Investment",
"benefits": "Clear statements of the transformational benefits you offer and how you set yourself apart from competitors",
"testimonials": "Any testimonials or quantitative success data that reinforce the premium value of your approach",
"pricingAdjustments": "How you plan to adjust pricing for different project scopes or client budgets",
"futurePricing": "Your ideas about package add-ons, retainer upgrades, or future services that might change your pricing model over time",
"revenueTargets": "What revenue targets or client acquisition goals you have in mind",
"constraints": "Any constraints or cost structures that influence your pricing strategy",
"milestones": "Details on milestones you're aiming for",
"tracking": "How you currently track performance and profitability in your engagements"
}

Ensure each field is a detailed string response tailored to the user's answers.
"#;

const FINAL_REPORT_SHAPE: &str = r#"
Generate a comprehensive JSON final report that synthesizes all previous responses into a cohesive consulting strategy. Include the following sections:

{
"executiveSummary": { "overview": "...", "keyStrategies": ["..."], "vision": "..." },
"marketAnalysis": { "targetMarket": "...", "competitiveLandscape": "...", "opportunities": ["..."], "threats": ["..."] },
"serviceStrategy": { "coreServices": ["..."], "valueProposition": "...", "deliveryModel": "...", "differentiators": ["..."] },
"pricingModel": { "structure": "...", "rates": "...", "packages": ["..."], "flexibility": "..." },
"implementationPlan": { "phases": ["..."], "timeline": "...", "milestones": ["..."], "resources": ["..."] },
"riskAssessment": { "businessRisks": ["..."], "mitigationStrategies": ["..."], "contingencyPlans": ["..."] },
"successMetrics": { "kpis": ["..."], "targets": "...", "evaluationMethod": "...", "reviewProcess": "..." }
}

Tailor each section to the user's responses, providing detailed and actionable insights.
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_answers_use_placeholder() {
        let prompt = build_prompt("pricing", &answers(&["   ", ""]), None);
        assert!(prompt.contains(NO_RESPONSES_PLACEHOLDER));
    }

    #[test]
    fn test_answers_joined_with_blank_line() {
        let prompt = build_prompt("positioning", &answers(&["first", " second "]), None);
        assert!(prompt.contains("first\n\nsecond"));
    }

    #[test]
    fn test_capabilities_prompt_switches_on_practice() {
        let without = build_prompt(CAPABILITIES_INVENTORY_SLUG, &answers(&["a"]), None);
        assert!(without.contains("exactly 5 consulting practice types"));

        let with = build_prompt(CAPABILITIES_INVENTORY_SLUG, &answers(&["a"]), Some("Data Strategy"));
        assert!(with.contains("selected \"Data Strategy\""));
        assert!(with.contains("\"practices\": [\"Data Strategy\"]"));
    }

    #[test]
    fn test_practice_ignored_outside_context_modules() {
        let prompt = build_prompt("pricing", &answers(&["a"]), Some("Data Strategy"));
        assert!(!prompt.contains("Data Strategy"));
    }

    #[test]
    fn test_strategy_framework_carries_practice() {
        let prompt = build_prompt(STRATEGY_FRAMEWORK_SLUG, &answers(&["a"]), Some("Ops"));
        assert!(prompt.contains("\"Ops\""));
        assert!(prompt.contains("valuePropositions"));
    }

    #[test]
    fn test_unknown_slug_uses_generic_template() {
        let prompt = build_prompt("mystery", &answers(&["a"]), None);
        assert!(prompt.contains("for the module \"mystery\""));
    }

    #[test]
    fn test_final_report_template() {
        let prompt = build_prompt(FINAL_REPORT_SLUG, &answers(&["a", "b"]), None);
        assert!(prompt.starts_with("You are an AI. The user has completed all modules"));
        assert!(prompt.contains("executiveSummary"));
    }
}
