//! The fixed instruction block sent with every classification call.

use super::response::Category;

const PREAMBLE: &str = "\
You are a manufacturing quality assistant that classifies emails as complaints or non-complaints.
This company makes electrical and mechanical parts for industrial customers.
Complaints come from BOTH external customers AND internal staff reporting quality issues.";

const SUMMARY_STYLE: &str = "\
Write a brief business-style summary in 1-2 sentences (<=45 words).
- State the concrete problem (e.g., \"wrong rev shipped\", \"cracked housing\", \"missing fasteners\", \"parts rejected due to dimension out of spec\").
- Include the requested action if present (e.g., \"RMA requested\", \"replacement requested\", \"credit requested\", \"rework needed\").
- Neutral tone; no verbatim copying.";

const CLASSIFIER: &str = "\
Return a boolean field is_complaint.

A \"complaint\" here means any email where a quality problem, defect, or nonconformance is being reported, tracked, or acted upon.

is_complaint = true when the email involves:
- A defective, damaged, or wrong part (wrong dimensions, wrong revision, cracked, scratched, bent, corroded, out of spec, etc.)
- Formal quality documents: NCMR, SCAR, DMR, RMA, NCR, CAR, 8D reports
- Parts being rejected during inspection (QC rejected, failed test, out of tolerance)
- Return or replacement requests due to a problem with parts
- Scrap transactions caused by defective parts
- Parts that need rework due to a defect (replating, regrinding, re-machining, etc.)
- A supplier delivering nonconforming material
- Missing parts or short shipments from an order
- Wrong items shipped (wrong part number, wrong quantity, wrong revision)
- Shipping damage (dented, broken, crushed during transit)
- Credit or debit memos related to quality issues or returns
- Field failures (parts failing at a customer site)
- Drawing or documentation errors that caused a quality problem (wrong BOM, wrong revision on traveler)
- Project tool notifications that reference a specific quality issue, defect, or nonconformance

is_complaint = false when:
- The email is purely administrative (PO confirmations, quotes, pricing, scheduling)
- General status updates with no mention of a problem or defect
- Newsletters, training, marketing, HR announcements
- Meeting invites or notes with no specific defect discussed
- Out-of-office replies
- Routine shipping coordination (tracking numbers, delivery schedules) with no issue
- General inquiries not about a defect or quality problem
- Calibration schedules or reminders (unless a calibration FAILURE is reported)
- Emails that only mention part numbers but describe no problem, defect, or action needed
- IT system notifications unrelated to quality

IMPORTANT: Read the full email body, not just the subject line. Many complaints have vague subjects (just a part number) but the body describes a real defect. If the body describes a defect, rejection, return, rework, or nonconformance, it IS a complaint regardless of the subject line.";

const OUTPUT_FORMAT: &str = "\
Return STRICT JSON with these keys ONLY:
- is_complaint          (boolean)
- summary               (string)
- category_suggested    (string; one of allowed categories)
- case_key              (string; <=80 chars; normalized)
- part_number           (string)";

const NOTES: &str = "\
Notes:
- The system validates part_number against the official master list. If your extracted part_number is not in that list, the system will set it to \"No part number provided\".
- Many complaints are INTERNAL emails from staff discussing defective parts, rejections, rework, or returns. These count as complaints.";

/// Breaks up control sequences some model families treat as turn markers.
fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("<s>", "< s >")
        .replace("</s>", "< / s >")
        .replace("[INST]", "[ INST ]")
        .replace("[/INST]", "[ / INST ]")
        .replace("<<SYS>>", "< < SYS > >")
        .replace("<</SYS>>", "< < / SYS > >")
}

fn constraints() -> String {
    let categories: Vec<String> = Category::ALL
        .iter()
        .map(|c| format!("\"{}\"", c.as_str()))
        .collect();
    format!(
        "EXTRACTION RULES:
- part_number: 5-25 chars, A-Z 0-9 - _ . / only; must include >=1 digit and >=1 letter.
- If a candidate part number does not appear in the company master list, treat it as missing.

If missing or uncertain, use:
- part_number: \"No part number provided\"

category_suggested must be ONE of:
[{}]

case_key: stable across replies. Use sender domain + (part_number if present else normalized subject) + short normalized problem phrase. Lowercase, letters/digits/-_/ only. <=80 chars.",
        categories.join(", ")
    )
}

/// Renders the full prompt for one message.
pub fn render_prompt(subject: &str, sender: &str, body: &str) -> String {
    format!(
        "{}\n\n{}\n\n{}\n\n{}\n\n{}\n\nINPUT\nSUBJECT (cleaned): {}\nFROM: {}\nBODY TEXT: {}\n\n{}\n",
        PREAMBLE,
        SUMMARY_STYLE,
        constraints(),
        CLASSIFIER,
        OUTPUT_FORMAT,
        sanitize_for_prompt(subject),
        sanitize_for_prompt(sender),
        sanitize_for_prompt(body),
        NOTES,
    )
}
