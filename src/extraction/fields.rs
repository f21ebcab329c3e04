use anyhow::{Context, Result, bail};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::model::{ExtractedFields, FieldValue};

pub const TAX_YEAR_FIELD: &str = "tax_year";

const TAX_YEAR_PATTERN: &str = r"(?:^|\D)(20\d{2})(?:\D|$)";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub patterns: Vec<String>,
}

// Pattern order matters: the first pattern that yields a usable value wins.
const W2_FIELD_TABLE: &[(&str, FieldKind, &[&str])] = &[
    (
        "employer_name",
        FieldKind::Text,
        &[
            r"(?:Employer|Company).*?([A-Z][A-Za-z\s&.,]+)",
            r"b\s*Employer identification number.*?\n([A-Z][A-Za-z\s&.,]+)",
        ],
    ),
    (
        "employer_address",
        FieldKind::Text,
        &[r"Employer'?s name, address,? and ZIP code[^\n]*\n[^\n]*\n([^\n]+\n[^\n]+)"],
    ),
    (
        "employer_ein",
        FieldKind::Text,
        &[
            r"(?:EIN|Employer identification number).*?(\d{2}-\d{7})",
            r"b\s*Employer identification number.*?(\d{2}-\d{7})",
        ],
    ),
    (
        "employee_ssn",
        FieldKind::Text,
        &[
            r"(?:SSN|Social Security Number).*?(\d{3}-\d{2}-\d{4})",
            r"(?:Employee.*?social security number).*?(\d{3}-\d{2}-\d{4})",
        ],
    ),
    (
        "employee_name",
        FieldKind::Text,
        &[r"Employee'?s (?:first )?name.*?\n\s*([A-Z][A-Za-z .'-]+)"],
    ),
    (
        "employee_address",
        FieldKind::Text,
        &[r"Employee'?s address,? and ZIP code[^\n]*\n([^\n]+\n[^\n]+)"],
    ),
    (
        "wages_tips_compensation",
        FieldKind::Number,
        &[
            r"(?:Box\s*1|Wages, tips, other compensation).*?(\d+(?:,\d{3})*(?:\.\d+)?)",
            r"1\s*Wages, tips, other compensation.*?(\d+(?:,\d{3})*(?:\.\d+)?)",
        ],
    ),
    (
        "federal_income_tax_withheld",
        FieldKind::Number,
        &[
            r"(?:Box\s*2|Federal income tax withheld).*?(\d+(?:,\d{3})*(?:\.\d+)?)",
            r"2\s*Federal income tax withheld.*?(\d+(?:,\d{3})*(?:\.\d+)?)",
        ],
    ),
    (
        "social_security_wages",
        FieldKind::Number,
        &[
            r"(?:Box\s*3|Social security wages).*?(\d+(?:,\d{3})*(?:\.\d+)?)",
            r"3\s*Social security wages.*?(\d+(?:,\d{3})*(?:\.\d+)?)",
        ],
    ),
    (
        "social_security_tax_withheld",
        FieldKind::Number,
        &[
            r"(?:Box\s*4|Social security tax withheld).*?(\d+(?:,\d{3})*(?:\.\d+)?)",
            r"4\s*Social security tax withheld.*?(\d+(?:,\d{3})*(?:\.\d+)?)",
        ],
    ),
    (
        "medicare_wages",
        FieldKind::Number,
        &[
            r"(?:Box\s*5|Medicare wages and tips).*?(\d+(?:,\d{3})*(?:\.\d+)?)",
            r"5\s*Medicare wages and tips.*?(\d+(?:,\d{3})*(?:\.\d+)?)",
        ],
    ),
    (
        "medicare_tax_withheld",
        FieldKind::Number,
        &[
            r"(?:Box\s*6|Medicare tax withheld).*?(\d+(?:,\d{3})*(?:\.\d+)?)",
            r"6\s*Medicare tax withheld.*?(\d+(?:,\d{3})*(?:\.\d+)?)",
        ],
    ),
    (
        "social_security_tips",
        FieldKind::Number,
        &[r"(?:Box\s*7|Social security tips).*?(\d+(?:,\d{3})*(?:\.\d+)?)"],
    ),
    (
        "allocated_tips",
        FieldKind::Number,
        &[r"(?:Box\s*8|Allocated tips).*?(\d+(?:,\d{3})*(?:\.\d+)?)"],
    ),
    (
        "dependent_care_benefits",
        FieldKind::Number,
        &[r"(?:Box\s*10|Dependent care benefits).*?(\d+(?:,\d{3})*(?:\.\d+)?)"],
    ),
    (
        "nonqualified_plans",
        FieldKind::Number,
        &[r"(?:Box\s*11|Nonqualified plans).*?(\d+(?:,\d{3})*(?:\.\d+)?)"],
    ),
    (
        "state_wages",
        FieldKind::Number,
        &[r"(?:Box\s*16|State wages, tips, etc\.?).*?(\d+(?:,\d{3})*(?:\.\d+)?)"],
    ),
    (
        "state_income_tax",
        FieldKind::Number,
        &[r"(?:Box\s*17|State income tax).*?(\d+(?:,\d{3})*(?:\.\d+)?)"],
    ),
    (
        "local_wages",
        FieldKind::Number,
        &[r"(?:Box\s*18|Local wages, tips, etc\.?).*?(\d+(?:,\d{3})*(?:\.\d+)?)"],
    ),
    (
        "local_income_tax",
        FieldKind::Number,
        &[r"(?:Box\s*19|Local income tax).*?(\d+(?:,\d{3})*(?:\.\d+)?)"],
    ),
];

pub fn w2_field_specs() -> Vec<FieldSpec> {
    W2_FIELD_TABLE
        .iter()
        .map(|(name, kind, patterns)| FieldSpec {
            name: name.to_string(),
            kind: *kind,
            patterns: patterns.iter().map(|pattern| pattern.to_string()).collect(),
        })
        .collect()
}

#[derive(Debug, Clone)]
struct CompiledField {
    name: String,
    kind: FieldKind,
    patterns: Vec<Regex>,
}

#[derive(Debug, Clone)]
pub struct FieldCatalog {
    fields: Vec<CompiledField>,
    tax_year: Regex,
}

impl FieldCatalog {
    pub fn w2() -> Result<Self> {
        Self::from_specs(&w2_field_specs())
    }

    pub fn from_specs(specs: &[FieldSpec]) -> Result<Self> {
        let mut fields = Vec::with_capacity(specs.len());
        for spec in specs {
            let patterns = spec
                .patterns
                .iter()
                .map(|pattern| compile_field_pattern(&spec.name, pattern))
                .collect::<Result<Vec<_>>>()?;
            fields.push(CompiledField {
                name: spec.name.clone(),
                kind: spec.kind,
                patterns,
            });
        }

        Ok(Self {
            fields,
            tax_year: Regex::new(TAX_YEAR_PATTERN).context("failed to compile tax year regex")?,
        })
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    pub fn extract(&self, text: &str) -> ExtractedFields {
        let mut extracted = ExtractedFields::new();

        for field in &self.fields {
            let value = match field.kind {
                FieldKind::Text => first_extraction(&field.patterns, text, |raw| {
                    Some(FieldValue::Text(raw.to_string()))
                }),
                FieldKind::Number => {
                    first_extraction(&field.patterns, text, |raw| {
                        coerce_number(raw).map(FieldValue::Number)
                    })
                }
            };

            if let Some(value) = value {
                extracted.insert(field.name.clone(), value);
            }
        }

        if let Some(year) = self.detect_tax_year(text) {
            extracted.insert(TAX_YEAR_FIELD.to_string(), FieldValue::Year(year));
        }

        extracted
    }

    pub fn detect_tax_year(&self, text: &str) -> Option<i32> {
        self.tax_year
            .captures(text)
            .and_then(|captures| captures.get(1))
            .and_then(|year| year.as_str().parse::<i32>().ok())
    }
}

fn compile_field_pattern(field: &str, pattern: &str) -> Result<Regex> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .with_context(|| format!("failed to compile pattern for field {field}: {pattern}"))?;

    if regex.captures_len() != 2 {
        bail!(
            "pattern for field {field} must have exactly one capture group: {pattern}"
        );
    }

    Ok(regex)
}

// Each pattern is tried against its first match only; a value that fails to
// convert moves on to the next pattern.
fn first_extraction<T>(
    patterns: &[Regex],
    text: &str,
    convert: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    patterns.iter().find_map(|pattern| {
        let captures = pattern.captures(text)?;
        let raw = captures.get(1)?.as_str().trim();
        convert(raw)
    })
}

pub fn coerce_number(raw: &str) -> Option<f64> {
    raw.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
