use course_db::models::registration::Registration;
use course_db::models::reseller::Sale;

use crate::utils::{country_label, format_timestamp};

const REGISTRATION_HEADERS: [&str; 9] = [
    "الاسم الأول",
    "اسم العائلة",
    "البريد الإلكتروني",
    "الهاتف",
    "البلد",
    "نوع التسجيل",
    "المبلغ",
    "الحالة",
    "التاريخ",
];

const SALES_HEADERS: [&str; 7] = [
    "الكود",
    "اسم الطالب",
    "البريد الإلكتروني",
    "المبلغ",
    "العمولة",
    "الحالة",
    "التاريخ",
];

/// CSV exports for the admin and reseller dashboards.
pub struct ExportService;

impl ExportService {
    pub fn registrations_csv(registrations: &[Registration]) -> String {
        let rows = registrations.iter().map(|reg| {
            vec![
                reg.first_name.clone(),
                reg.last_name.clone(),
                reg.email.clone(),
                reg.phone.clone(),
                country_label(&reg.country).to_string(),
                reg.registration_type.label().to_string(),
                reg.amount.to_string(),
                reg.status.label().to_string(),
                format_timestamp(&reg.timestamp),
            ]
        });
        to_csv(&REGISTRATION_HEADERS, rows)
    }

    pub fn sales_csv(sales: &[Sale]) -> String {
        let rows = sales.iter().map(|sale| {
            vec![
                sale.code.clone(),
                sale.student_name.clone(),
                sale.student_email.clone(),
                sale.amount.to_string(),
                sale.commission.to_string(),
                sale.status.label().to_string(),
                format_timestamp(&sale.timestamp),
            ]
        });
        to_csv(&SALES_HEADERS, rows)
    }
}

fn to_csv(headers: &[&str], rows: impl Iterator<Item = Vec<String>>) -> String {
    let mut lines = vec![headers.join(",")];
    lines.extend(rows.map(|row| {
        row.iter()
            .map(|field| escape_field(field))
            .collect::<Vec<_>>()
            .join(",")
    }));
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::registration;
    use chrono::{TimeZone, Utc};
    use course_db::models::registration::{PaymentMethod, RegistrationType};
    use course_db::models::reseller::SaleStatus;

    #[test]
    fn registration_rows_use_arabic_labels() {
        let mut reg = registration("r1", "uae", RegistrationType::International, 150);
        reg.timestamp = Utc.with_ymd_and_hms(2025, 1, 16, 14, 15, 0).unwrap();

        let csv = ExportService::registrations_csv(&[reg]);
        let mut lines = csv.lines();

        assert_eq!(
            lines.next(),
            Some("الاسم الأول,اسم العائلة,البريد الإلكتروني,الهاتف,البلد,نوع التسجيل,المبلغ,الحالة,التاريخ")
        );
        assert_eq!(
            lines.next(),
            Some("Sara,Ali,r1@example.com,+971501234567,الإمارات,دولي,150,مؤكد,2025-01-16 14:15")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        let mut reg = registration("r1", "syria", RegistrationType::SyriaFree, 0);
        reg.first_name = "Sara, \"Sally\"".to_string();

        let csv = ExportService::registrations_csv(&[reg]);
        assert!(csv.lines().nth(1).unwrap().starts_with("\"Sara, \"\"Sally\"\"\",Ali,"));
    }

    #[test]
    fn sales_report_headers() {
        let sale = Sale {
            id: "SALE_1".to_string(),
            code: "AHMED-SYRIA-ABC123".to_string(),
            student_name: "محمد علي".to_string(),
            student_email: "mohamed.ali@example.com".to_string(),
            amount: 50,
            commission: 5,
            status: SaleStatus::Confirmed,
            timestamp: Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap(),
            payment_method: PaymentMethod::Cash,
        };

        let csv = ExportService::sales_csv(&[sale]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "الكود,اسم الطالب,البريد الإلكتروني,المبلغ,العمولة,الحالة,التاريخ");
        assert_eq!(lines[1], "AHMED-SYRIA-ABC123,محمد علي,mohamed.ali@example.com,50,5,مؤكد,2025-01-15 10:30");
    }
}
