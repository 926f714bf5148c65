use crate::domain::model::{EnrollmentRequest, ValidatedEnrollment};
use crate::domain::plans::PlanTable;
use crate::utils::error::{FieldError, WorkflowError};
use crate::utils::validation::is_valid_email;

/// 檢查必填欄位與 email 格式並對應方案；收集所有錯誤後一次回報
pub fn validate_request(
    request: &EnrollmentRequest,
    plans: &PlanTable,
) -> Result<ValidatedEnrollment, WorkflowError> {
    let mut errors = Vec::new();

    let first_name = required(&mut errors, "firstName", &request.first_name);
    let last_name = required(&mut errors, "lastName", &request.last_name);
    let country = required(&mut errors, "country", &request.country);
    let payment_token = required(&mut errors, "token", &request.payment_token);

    let email = required(&mut errors, "email", &request.email);
    if !email.is_empty() && !is_valid_email(&email) {
        errors.push(FieldError::new("email", "is not a valid email address"));
    }

    let plan_selector = required(&mut errors, "plan", &request.plan_selector);
    let plan_code = if plan_selector.is_empty() {
        None
    } else {
        let code = plans.resolve(&plan_selector).map(str::to_string);
        if code.is_none() {
            let known = plans.selectors().collect::<Vec<_>>().join(", ");
            errors.push(FieldError::new(
                "plan",
                format!("unknown plan '{}' (expected one of: {})", plan_selector, known),
            ));
        }
        code
    };

    let phone = request
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    match plan_code {
        Some(plan_code) if errors.is_empty() => Ok(ValidatedEnrollment {
            first_name,
            last_name,
            email,
            country,
            plan_selector: PlanTable::normalize(&plan_selector),
            plan_code,
            payment_token,
            phone,
        }),
        _ => Err(WorkflowError::Validation(errors)),
    }
}

fn required(errors: &mut Vec<FieldError>, field: &str, value: &Option<String>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => {
            errors.push(FieldError::new(field, "is required"));
            String::new()
        }
    }
}
