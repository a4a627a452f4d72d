//! Endpoint categories

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification label for a group of endpoints
///
/// Every category except [`Category::Exempt`] has its own rate limit
/// policy and its own bucket per client. `Exempt` means the request is
/// never evaluated at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Login,
    Register,
    #[serde(alias = "password_reset")]
    PasswordReset,
    Booking,
    Chat,
    Review,
    #[serde(alias = "file_upload")]
    FileUpload,
    Payment,
    Search,
    Profile,
    Notification,
    Restaurant,
    Customer,
    Admin,
    Report,
    Voucher,
    Waitlist,
    Table,
    Menu,
    Reservation,
    Feedback,
    Support,
    Analytics,
    Settings,
    Dashboard,
    /// Generic `/api/*` traffic not covered by a more specific category
    Api,
    /// Catch-all for unmatched paths
    General,
    /// Static assets and health checks; skips evaluation entirely
    Exempt,
}

impl Category {
    /// Every rate-limited category, in classification order
    pub const ALL: [Category; 27] = [
        Category::Login,
        Category::Register,
        Category::PasswordReset,
        Category::Booking,
        Category::Chat,
        Category::Review,
        Category::FileUpload,
        Category::Payment,
        Category::Search,
        Category::Profile,
        Category::Notification,
        Category::Restaurant,
        Category::Customer,
        Category::Admin,
        Category::Report,
        Category::Voucher,
        Category::Waitlist,
        Category::Table,
        Category::Menu,
        Category::Reservation,
        Category::Feedback,
        Category::Support,
        Category::Analytics,
        Category::Settings,
        Category::Dashboard,
        Category::Api,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Login => "login",
            Category::Register => "register",
            Category::PasswordReset => "password-reset",
            Category::Booking => "booking",
            Category::Chat => "chat",
            Category::Review => "review",
            Category::FileUpload => "file-upload",
            Category::Payment => "payment",
            Category::Search => "search",
            Category::Profile => "profile",
            Category::Notification => "notification",
            Category::Restaurant => "restaurant",
            Category::Customer => "customer",
            Category::Admin => "admin",
            Category::Report => "report",
            Category::Voucher => "voucher",
            Category::Waitlist => "waitlist",
            Category::Table => "table",
            Category::Menu => "menu",
            Category::Reservation => "reservation",
            Category::Feedback => "feedback",
            Category::Support => "support",
            Category::Analytics => "analytics",
            Category::Settings => "settings",
            Category::Dashboard => "dashboard",
            Category::Api => "api",
            Category::General => "general",
            Category::Exempt => "exempt",
        }
    }

    pub fn is_exempt(&self) -> bool {
        matches!(self, Category::Exempt)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Category::ALL
            .iter()
            .chain(std::iter::once(&Category::Exempt))
            .find(|c| c.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("unknown endpoint category: {}", s))
    }
}
