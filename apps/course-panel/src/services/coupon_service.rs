use askama::Template;
use askama_web::WebTemplate;
use course_db::models::code::{CodeStatus, GeneratedCode};
use course_db::models::reseller::Reseller;
use course_db::models::settings::CourseSettings;

use crate::utils::arabic_date;

/// Everything printed on one coupon.
#[derive(Debug, Clone)]
pub struct CouponView {
    pub code: String,
    pub registration_url: String,
    pub reseller_name: String,
    pub price: u32,
    pub course_start: String,
    pub valid_until: String,
    pub host: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "coupon.html")]
pub struct CouponTemplate {
    pub coupon: CouponView,
}

#[derive(Template, WebTemplate)]
#[template(path = "coupons.html")]
pub struct CouponSheetTemplate {
    pub coupons: Vec<CouponView>,
}

#[derive(Clone)]
pub struct CouponService {
    public_host: String,
}

impl CouponService {
    pub fn new(public_host: String) -> Self {
        Self { public_host }
    }

    /// Link the QR code on a coupon points at.
    pub fn registration_url(&self, code: &str, reseller_id: &str) -> String {
        format!(
            "https://{}/?code={}&reseller={}",
            self.public_host,
            urlencoding::encode(code),
            urlencoding::encode(reseller_id)
        )
    }

    pub fn view(&self, reseller: &Reseller, entry: &GeneratedCode, settings: &CourseSettings) -> CouponView {
        CouponView {
            code: entry.code.clone(),
            registration_url: self.registration_url(&entry.code, &reseller.id),
            reseller_name: reseller.name.clone(),
            price: issued_price(entry, settings),
            course_start: arabic_date(&settings.start_date),
            valid_until: arabic_date(&settings.end_date),
            host: self.public_host.clone(),
        }
    }

    pub fn single(&self, reseller: &Reseller, entry: &GeneratedCode, settings: &CourseSettings) -> CouponTemplate {
        CouponTemplate {
            coupon: self.view(reseller, entry, settings),
        }
    }

    /// Print sheet for every code in the batch that is still unused.
    pub fn sheet(&self, reseller: &Reseller, codes: &[GeneratedCode], settings: &CourseSettings) -> CouponSheetTemplate {
        CouponSheetTemplate {
            coupons: codes
                .iter()
                .filter(|c| c.status == CodeStatus::Unused)
                .map(|c| self.view(reseller, c, settings))
                .collect(),
        }
    }

    pub fn share_text(&self, entry: &GeneratedCode, settings: &CourseSettings) -> String {
        format!(
            "كوبون دورة الذكاء الاصطناعي الشاملة - أُبي سكر\nتذكرة بقيمة ${}\nكود التسجيل: {}\n\nللتسجيل: https://{}/?code={}\n\nصالح حتى {}",
            issued_price(entry, settings),
            entry.code,
            self.public_host,
            urlencoding::encode(&entry.code),
            arabic_date(&settings.end_date)
        )
    }
}

/// Price stamped at issuance. Older entries carry none and show today's price.
fn issued_price(entry: &GeneratedCode, settings: &CourseSettings) -> u32 {
    if entry.amount > 0 {
        entry.amount
    } else {
        settings.ticket_price(&entry.ticket_type)
    }
}
