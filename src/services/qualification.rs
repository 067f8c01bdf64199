use crate::models::{IntakeData, LeadStatus, Priority, QualificationResult, Slot};
use crate::services::extraction::{is_accepted_insurance, Urgency, CASH_PAY};

const QUALIFIED_THRESHOLD: u8 = 85;

struct UrgencyPolicy {
    priority: Priority,
    action: &'static str,
    reason: &'static str,
}

fn urgency_policy(urgency: Urgency) -> UrgencyPolicy {
    match urgency {
        Urgency::Emergency => UrgencyPolicy {
            priority: Priority::Critical,
            action: "offer_immediate_appointment_or_transfer",
            reason: "Emergency requires immediate attention",
        },
        Urgency::SameDay => UrgencyPolicy {
            priority: Priority::High,
            action: "check_same_day_availability",
            reason: "Patient needs same-day appointment",
        },
        Urgency::Urgent => UrgencyPolicy {
            priority: Priority::Medium,
            action: "prioritize_this_week",
            reason: "Patient needs appointment within a week",
        },
        Urgency::Routine => UrgencyPolicy {
            priority: Priority::Normal,
            action: "book_routine_appointment",
            reason: "Routine appointment",
        },
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scores an intake record (0-100) and decides how the lead should be handled.
pub fn qualify(data: &IntakeData) -> QualificationResult {
    let mut score: u8 = 0;
    let mut reasons = vec![];
    let mut missing_info = vec![];

    let presence: [(Slot, u8, &str, String); 4] = [
        (Slot::Name, 15, "patient name", "Patient name collected".to_string()),
        (Slot::Phone, 20, "phone number", "Contact phone collected".to_string()),
        (Slot::Dob, 15, "date of birth", "Date of birth collected".to_string()),
        (
            Slot::Service,
            20,
            "service/procedure needed",
            format!("Service requested: {}", data.get(Slot::Service).unwrap_or_default()),
        ),
    ];
    for (slot, weight, missing_label, reason) in presence {
        if data.is_set(slot) {
            score += weight;
            reasons.push(reason);
        } else {
            missing_info.push(missing_label.to_string());
        }
    }

    match data.get(Slot::Insurance) {
        Some(CASH_PAY) => {
            score += 15;
            reasons.push("Cash-pay patient accepted".to_string());
        }
        Some(insurance) if is_accepted_insurance(insurance) => {
            score += 15;
            reasons.push(format!("{} insurance is accepted", title_case(insurance)));
        }
        Some(insurance) => {
            reasons.push(format!("{} is not in our network", title_case(insurance)));
            return QualificationResult {
                status: LeadStatus::NotQualified,
                priority: Priority::Low,
                score,
                reasons,
                missing_info,
                next_steps: "Politely explain we don't accept their insurance. Offer to check if they'd like to pay cash.".to_string(),
            };
        }
        None => missing_info.push("insurance information".to_string()),
    }

    let urgency = data
        .get(Slot::Urgency)
        .and_then(Urgency::parse)
        .unwrap_or(Urgency::Routine);
    let policy = urgency_policy(urgency);
    score += 15;
    reasons.push(policy.reason.to_string());

    if urgency == Urgency::Emergency {
        return QualificationResult {
            status: LeadStatus::Emergency,
            priority: policy.priority,
            score,
            reasons,
            missing_info,
            next_steps: "Transfer to staff immediately or offer emergency appointment".to_string(),
        };
    }

    if !missing_info.is_empty() {
        let next_steps = format!("Ask for: {}", missing_info.join(", "));
        return QualificationResult {
            status: LeadStatus::NeedsMoreInfo,
            priority: policy.priority,
            score,
            reasons,
            missing_info,
            next_steps,
        };
    }

    if score >= QUALIFIED_THRESHOLD {
        return QualificationResult {
            status: LeadStatus::Qualified,
            priority: policy.priority,
            score,
            reasons,
            missing_info,
            next_steps: policy.action.to_string(),
        };
    }

    // Complete but under threshold: held for review.
    QualificationResult {
        status: LeadStatus::NeedsMoreInfo,
        priority: policy.priority,
        score,
        reasons,
        missing_info,
        next_steps: "Collect remaining information".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(insurance: &str, urgency: Option<&str>) -> IntakeData {
        let mut data = IntakeData::default();
        data.fill(Slot::Name, "John Smith");
        data.fill(Slot::Phone, "5551234567");
        data.fill(Slot::Dob, "01/15/1990");
        data.fill(Slot::Service, "cleaning");
        data.fill(Slot::Insurance, insurance);
        if let Some(urgency) = urgency {
            data.fill(Slot::Urgency, urgency);
        }
        data
    }

    #[test]
    fn test_complete_record_is_qualified() {
        let result = qualify(&complete("aetna", Some("routine")));
        assert_eq!(result.status, LeadStatus::Qualified);
        assert_eq!(result.score, 100);
        assert_eq!(result.priority, Priority::Normal);
        assert_eq!(result.next_steps, "book_routine_appointment");
        assert!(result.reasons.iter().any(|r| r == "Aetna insurance is accepted"));
    }

    #[test]
    fn test_cash_pay_counts_as_accepted() {
        let result = qualify(&complete(CASH_PAY, Some("same_day")));
        assert_eq!(result.status, LeadStatus::Qualified);
        assert_eq!(result.priority, Priority::High);
    }

    #[test]
    fn test_out_of_network_insurance_exits_early() {
        let result = qualify(&complete("kaiser", Some("routine")));
        assert_eq!(result.status, LeadStatus::NotQualified);
        assert_eq!(result.priority, Priority::Low);
        assert_eq!(result.score, 70);
    }

    #[test]
    fn test_emergency_wins_over_missing_fields() {
        let mut data = IntakeData::default();
        data.fill(Slot::Urgency, "emergency");
        let result = qualify(&data);
        assert_eq!(result.status, LeadStatus::Emergency);
        assert_eq!(result.priority, Priority::Critical);
        assert_eq!(result.score, 15);
        assert_eq!(result.missing_info.len(), 5);
    }

    #[test]
    fn test_partial_record_needs_more_info() {
        let mut data = IntakeData::default();
        data.fill(Slot::Name, "John Smith");
        data.fill(Slot::Service, "cleaning");
        let result = qualify(&data);
        assert_eq!(result.status, LeadStatus::NeedsMoreInfo);
        assert_eq!(result.score, 50);
        assert_eq!(
            result.next_steps,
            "Ask for: phone number, date of birth, insurance information"
        );
    }
}
