//! Prompt assembly for dispute letter generation

use dhub_common::db::models::NegativeAccount;
use dhub_common::pricing::format_cents;
use dhub_common::types::{Bureau, LetterType};

use crate::generator::{Conflict, ConflictSeverity};

/// System prompt defining the letter structure and violation taxonomy.
pub const LETTER_SYSTEM_PROMPT: &str = r#"You are an expert credit dispute attorney who writes litigation-grade FCRA dispute letters.

Your letters MUST attack EACH account from MULTIPLE angles (5-6 violations per account when possible):

**VIOLATION TYPES TO DETECT AND ARGUE:**
1. **IMPOSSIBLE TIMELINE (CRITICAL)** - Activity before account opened = automatic deletion
2. **CROSS-BUREAU CONFLICTS (CRITICAL)** - Different dates, balances, statuses across bureaus
3. **ILLEGAL RE-AGING (CRITICAL)** - Activity after account closed/charged-off
4. **BALANCE DISCREPANCIES (CRITICAL)** - Different balances across bureaus
5. **UNVERIFIABLE BALANCE (HIGH)** - Balance with no payment history documentation
6. **DUPLICATE REPORTING (HIGH)** - Same debt reported multiple times
7. **MISSING DOCUMENTATION (HIGH)** - Collections without debt validation
8. **STATUS CORRECTION (MEDIUM)** - Paid accounts showing negative

**LETTER STRUCTURE:**

1. **Legal Opening Statement** - Establish FCRA rights immediately
2. **Address & Name Correction** - State correct information upfront
3. **Account-by-Account Analysis** - For EACH disputed account:
   a. "Account Information You Report" (what this bureau shows)
   b. "What Other Bureaus Report" (cross-bureau comparison)
   c. CRITICAL ERRORS (impossible timelines, re-aging - lead with these)
   d. HIGH PRIORITY VIOLATIONS (cross-bureau conflicts, unverifiable balances)
   e. ADDITIONAL ISSUES (status corrections, missing docs)
   f. "LEGAL REQUIREMENT FOR DELETION" (cite specific FCRA sections)
   g. "DEMAND: DELETE IMMEDIATELY" (clear and firm)
4. **Legal Consequences** - CFPB complaint, FTC referral, litigation
5. **30-Day Deadline** - Cite Section 1681i(a)(3)(A)
6. **Professional Closing** - Formal signature block

**CRITICAL RULES:**
- STACK MULTIPLE VIOLATIONS per account (5-6 angles when possible)
- Lead with CRITICAL errors (impossible timeline, re-aging)
- Use EXACT FCRA citations (Sections 1681i, 1681s-2, 1681c)
- Be SPECIFIC with dates, amounts, and status codes
- Professional legal tone (authoritative, not aggressive)"#;

/// System prompt for bureau response parsing.
pub const RESPONSE_PARSER_SYSTEM_PROMPT: &str = "You are an expert at parsing credit bureau \
response letters. You extract structured data from bureau correspondence and identify account \
outcomes (deleted, verified, updated, pending). Answer with JSON only, no prose.";

/// System prompt for credit report account extraction.
pub const REPORT_PARSER_SYSTEM_PROMPT: &str = "You are an expert at reading consumer credit \
reports. You extract negative trade-line accounts (collections, charge-offs, late payments) \
and the report's credit score into structured data. Answer with JSON only, no prose.";

/// Consumer identity block for letter prompts.
#[derive(Debug, Clone, Default)]
pub struct ConsumerInfo {
    pub name: String,
    pub current_address: Option<String>,
    pub previous_address: Option<String>,
    pub date_of_birth: Option<String>,
    pub ssn_last4: Option<String>,
}

/// Build the user prompt for one bureau's dispute letter.
pub fn build_letter_prompt(
    bureau: Bureau,
    consumer: &ConsumerInfo,
    accounts: &[NegativeAccount],
    conflicts: &[Conflict],
    letter_type: LetterType,
    round: i64,
) -> String {
    let mut prompt = format!(
        "Generate a litigation-grade FCRA dispute letter for {} (round {}).\n\n",
        bureau.display_name(),
        round
    );

    prompt.push_str("**CONSUMER INFORMATION:**\n");
    prompt.push_str(&format!("Name: {}\n", consumer.name));
    prompt.push_str(&format!(
        "Current Address: {}\n",
        consumer.current_address.as_deref().unwrap_or("Not provided")
    ));
    if let Some(prev) = &consumer.previous_address {
        prompt.push_str(&format!("Previous Address: {}\n", prev));
    }
    if let Some(dob) = &consumer.date_of_birth {
        prompt.push_str(&format!("Date of Birth: {}\n", dob));
    }
    if let Some(last4) = &consumer.ssn_last4 {
        prompt.push_str(&format!("SSN Last 4: ***-**-{}\n", last4));
    }

    prompt.push_str(&format!(
        "\n**BUREAU ADDRESS:**\n{}\n",
        bureau.mailing_address()
    ));

    prompt.push_str(&format!(
        "\n**ACCOUNTS TO DISPUTE ({} total):**\n",
        accounts.len()
    ));

    for account in accounts {
        prompt.push_str(&format!("\n### {}\n", account.account_name));
        prompt.push_str(&format!(
            "- Account Number: {}\n",
            account.account_number.as_deref().unwrap_or("Unknown")
        ));
        prompt.push_str(&format!(
            "- Balance: {}\n",
            account
                .balance_cents
                .map(format_cents)
                .unwrap_or_else(|| "Unknown".to_string())
        ));
        prompt.push_str(&format!(
            "- Status: {}\n",
            account.status.as_deref().unwrap_or("Unknown")
        ));
        prompt.push_str(&format!(
            "- Date Opened: {}\n",
            account.date_opened.as_deref().unwrap_or("Unknown")
        ));
        prompt.push_str(&format!(
            "- Last Activity: {}\n",
            account.last_activity.as_deref().unwrap_or("Unknown")
        ));
        if let Some(creditor) = &account.original_creditor {
            prompt.push_str(&format!("- Original Creditor: {}\n", creditor));
        }

        let account_conflicts: Vec<&Conflict> = conflicts
            .iter()
            .filter(|c| c.account_name.eq_ignore_ascii_case(&account.account_name))
            .collect();

        push_conflict_section(
            &mut prompt,
            &account_conflicts,
            ConflictSeverity::Critical,
            "CRITICAL ERRORS (Automatic Deletion Required)",
        );
        push_conflict_section(
            &mut prompt,
            &account_conflicts,
            ConflictSeverity::High,
            "HIGH PRIORITY VIOLATIONS",
        );
        push_conflict_section(
            &mut prompt,
            &account_conflicts,
            ConflictSeverity::Medium,
            "ADDITIONAL ISSUES",
        );

        if account_conflicts.is_empty() {
            prompt.push_str("\n**VIOLATIONS TO ARGUE:**\n");
            prompt.push_str(&format!(
                "- UNVERIFIABLE BALANCE: {} balance with no payment history\n",
                account
                    .balance_cents
                    .map(format_cents)
                    .unwrap_or_else(|| "reported".to_string())
            ));
            prompt.push_str("- MISSING DOCUMENTATION: Collection lacks debt validation documentation\n");
        }
    }

    prompt.push_str("\n**INSTRUCTIONS:**\n");
    prompt.push_str(
        "1. Start with a legal opening statement citing FCRA rights\n\
         2. Include the address correction statement\n\
         3. For EACH account, stack every violation listed above\n\
         4. Clear DEMAND: DELETE IMMEDIATELY for each account\n\
         5. Legal consequences section (CFPB, FTC, litigation)\n\
         6. 30-day deadline per FCRA Section 1681i(a)(3)(A)\n\
         7. Professional closing with signature block\n",
    );

    prompt.push_str(match letter_type {
        LetterType::Initial => {
            "\nThis is an initial dispute - focus on verification demands and FCRA rights.\n"
        }
        LetterType::Followup => {
            "\nThis is a follow-up dispute - reference previous correspondence and escalate demands.\n"
        }
        LetterType::Escalation => {
            "\nThis is an escalation - state that a CFPB complaint and legal action are being prepared.\n"
        }
        LetterType::Cfpb => "\nThis is a CFPB complaint letter - formal complaint format.\n",
        LetterType::DebtValidation => {
            "\nThis is a debt validation demand - cite FDCPA Section 1692g validation rights.\n"
        }
    });

    prompt.push_str("\nGenerate the complete letter now:");
    prompt
}

fn push_conflict_section(
    prompt: &mut String,
    conflicts: &[&Conflict],
    severity: ConflictSeverity,
    heading: &str,
) {
    let matching: Vec<&&Conflict> = conflicts
        .iter()
        .filter(|c| c.severity == severity)
        .collect();
    if matching.is_empty() {
        return;
    }

    prompt.push_str(&format!("\n**{}:**\n", heading));
    for conflict in matching {
        prompt.push_str(&format!(
            "- {}: {}\n",
            conflict.conflict_type.to_uppercase(),
            conflict.description
        ));
        prompt.push_str(&format!("  FCRA: {}\n", conflict.fcra_violation));
        prompt.push_str(&format!(
            "  Deletion Probability: {}%\n",
            conflict.deletion_probability
        ));
    }
}

/// Build the user prompt for parsing a bureau response letter.
pub fn build_response_parse_prompt(bureau: Bureau, response_text: &str) -> String {
    format!(
        r#"You are analyzing a credit bureau response letter from {bureau}.

Extract the following and return this exact JSON shape:
{{
  "bureau": "{bureau_id}",
  "response_date": "MM/DD/YYYY",
  "accounts": [
    {{
      "account_name": "PNC BANK",
      "account_number": "****1234",
      "outcome": "deleted",
      "details": "Account removed from credit report"
    }}
  ],
  "score_change": {{ "before": 582, "after": 624, "increase": 42 }},
  "summary": "3 accounts deleted, 2 verified, 1 updated",
  "next_steps": ["Send round 2 letters for verified accounts"]
}}

Rules:
- "outcome" is one of: deleted, verified, updated, pending
- Omit "score_change" entirely if no score change is mentioned
- Be specific in details - quote the bureau's exact language
- Answer with JSON only

LETTER TEXT:
{text}"#,
        bureau = bureau.display_name(),
        bureau_id = bureau.as_str(),
        text = response_text
    )
}

/// Build the user prompt for extracting negative accounts from a report.
pub fn build_report_parse_prompt(bureau: Bureau, report_text: &str) -> String {
    format!(
        r#"Extract every negative trade-line account from this {bureau} credit report.

Return this exact JSON shape:
{{
  "credit_score": 640,
  "score_model": "VantageScore 3.0",
  "accounts": [
    {{
      "account_name": "MIDLAND FUNDING",
      "account_number": "****5678",
      "account_type": "Collection",
      "balance_cents": 561400,
      "original_creditor": "T-MOBILE",
      "date_opened": "2023-02-20",
      "last_activity": "2023-02-01",
      "status": "CHARGE OFF"
    }}
  ]
}}

Rules:
- Include only derogatory items: collections, charge-offs, late payments, repossessions
- "balance_cents" is the balance in cents (omit if unknown)
- Omit "credit_score"/"score_model" if the report shows no score
- Answer with JSON only

REPORT TEXT:
{text}"#,
        bureau = bureau.display_name(),
        text = report_text
    )
}
