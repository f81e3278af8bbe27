/// Domain models for Lead Scribe
///
/// These models represent core business entities and are platform-agnostic.
use crate::error::AppError;
use serde::{Deserialize, Serialize};

/// Declares a closed enum domain with its wire spelling.
///
/// The same literal is used for serde, `Display`, `FromStr` and the prompt
/// schema, so a value can never be spelled two different ways.
macro_rules! closed_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every member of the domain, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Wire spellings of every member
            pub fn names() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(AppError::InvalidInput(format!(
                        "unknown {} value: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

closed_enum! {
    /// Prospect's industry vertical
    Industry {
        Retail => "retail",
        Ecommerce => "ecommerce",
        Healthcare => "healthcare",
        Education => "education",
        FinancialServices => "financial_services",
        RealEstate => "real_estate",
        Tourism => "tourism",
        Logistics => "logistics",
        Technology => "technology",
        ProfessionalServices => "professional_services",
        FoodAndBeverage => "food_and_beverage",
        Government => "government",
        Other => "other",
    }
}

closed_enum! {
    CompanySize {
        Micro => "micro",
        Small => "small",
        Medium => "medium",
        Large => "large",
        Enterprise => "enterprise",
    }
}

closed_enum! {
    PainPoint {
        HighVolume => "high_volume",
        SlowResponse => "slow_response",
        RepetitiveQuestions => "repetitive_questions",
        AfterHoursCoverage => "after_hours_coverage",
        Scalability => "scalability",
        LeadQualification => "lead_qualification",
        Scheduling => "scheduling",
        MultichannelChaos => "multichannel_chaos",
        ManualProcesses => "manual_processes",
        StaffCosts => "staff_costs",
    }
}

closed_enum! {
    /// How the prospect first heard about the product
    LeadSource {
        Conference => "conference",
        Referral => "referral",
        WebSearch => "web_search",
        SocialMedia => "social_media",
        Webinar => "webinar",
        Podcast => "podcast",
        Advertising => "advertising",
        Article => "article",
        TradeFair => "trade_fair",
        Unknown => "unknown",
    }
}

closed_enum! {
    VolumeUnit {
        Daily => "daily",
        Weekly => "weekly",
        Monthly => "monthly",
        Yearly => "yearly",
    }
}

closed_enum! {
    /// Systems the prospect needs connected
    Integration {
        Crm => "crm",
        Erp => "erp",
        EcommercePlatform => "ecommerce_platform",
        Calendar => "calendar",
        Helpdesk => "helpdesk",
        Whatsapp => "whatsapp",
        Email => "email",
        Payments => "payments",
        Spreadsheets => "spreadsheets",
        CustomApi => "custom_api",
    }
}

closed_enum! {
    Urgency {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

closed_enum! {
    Sentiment {
        Positive => "positive",
        Neutral => "neutral",
        Negative => "negative",
        Skeptical => "skeptical",
    }
}

closed_enum! {
    /// Primary job the prospect is hiring the product to do
    JobToBeDone {
        AutomateSupport => "automate_support",
        QualifyLeads => "qualify_leads",
        ScheduleAppointments => "schedule_appointments",
        IncreaseSales => "increase_sales",
        ReduceCosts => "reduce_costs",
        ScaleOperations => "scale_operations",
        UnifyChannels => "unify_channels",
    }
}

closed_enum! {
    SuccessMetric {
        ResponseTime => "response_time",
        ConversionRate => "conversion_rate",
        CustomerSatisfaction => "customer_satisfaction",
        CostReduction => "cost_reduction",
        ResolutionRate => "resolution_rate",
        Availability => "availability",
    }
}

closed_enum! {
    Objection {
        Price => "price",
        ImplementationTime => "implementation_time",
        IntegrationComplexity => "integration_complexity",
        DataSecurity => "data_security",
        AiAccuracy => "ai_accuracy",
        ChangeManagement => "change_management",
        ContractTerms => "contract_terms",
    }
}

closed_enum! {
    /// Role of the person on the prospect side of the call
    BuyerRole {
        Owner => "owner",
        Executive => "executive",
        Manager => "manager",
        Operations => "operations",
        Technical => "technical",
        Unknown => "unknown",
    }
}

closed_enum! {
    /// Outcome of a stored extraction or of a single provider attempt
    ExtractionStatus {
        Succeeded => "succeeded",
        Failed => "failed",
    }
}

closed_enum! {
    /// Runtime state of a meeting inside the orchestrator
    ExtractionState {
        NotStarted => "not_started",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
    }
}

impl From<ExtractionStatus> for ExtractionState {
    fn from(status: ExtractionStatus) -> Self {
        match status {
            ExtractionStatus::Succeeded => ExtractionState::Succeeded,
            ExtractionStatus::Failed => ExtractionState::Failed,
        }
    }
}

/// Current time as Unix milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Represents a recorded sales meeting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Option<i64>,
    pub client_name: String,
    pub client_email: Option<String>,
    pub seller: Option<String>,
    pub meeting_date: Option<String>, // ISO date as ingested
    pub closed: bool,
    pub transcript: String,
    pub created_at: i64,
}

impl Meeting {
    /// Creates a new meeting instance
    pub fn new(client_name: String, transcript: String) -> Self {
        Self {
            id: None,
            client_name,
            client_email: None,
            seller: None,
            meeting_date: None,
            closed: false,
            transcript,
            created_at: now_millis(),
        }
    }

    /// Sets the seller (builder pattern)
    pub fn with_seller(mut self, seller: Option<String>) -> Self {
        self.seller = seller;
        self
    }

    /// Sets the closed flag (builder pattern)
    pub fn with_closed(mut self, closed: bool) -> Self {
        self.closed = closed;
        self
    }
}

/// Raw transcript text keyed by meeting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transcript {
    pub meeting_id: i64,
    pub text: String,
}

/// Interaction volume reported by the prospect
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub quantity: u32,
    pub unit: VolumeUnit,
    pub is_peak: bool,
}

/// The structured, enum-constrained facts extracted from one transcript
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionFields {
    pub industry: Option<Industry>,
    pub company_size: Option<CompanySize>,
    #[serde(default)]
    pub pain_points: Vec<PainPoint>,
    pub lead_source: Option<LeadSource>,
    pub volume: Option<Volume>,
    #[serde(default)]
    pub integrations: Vec<Integration>,
    pub urgency: Option<Urgency>,
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub jtbd_primary: Vec<JobToBeDone>,
    #[serde(default)]
    pub success_metrics: Vec<SuccessMetric>,
    #[serde(default)]
    pub objections: Vec<Objection>,
    pub buyer_role: Option<BuyerRole>,
}

/// The single current extraction for a meeting (upserted by meeting id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub id: Option<i64>,
    pub meeting_id: i64,
    pub status: ExtractionStatus,
    pub model: String,
    pub fields: ExtractionFields,
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ExtractionRecord {
    /// Record for a run where a provider produced fields
    pub fn succeeded(meeting_id: i64, model: String, fields: ExtractionFields) -> Self {
        let now = now_millis();
        Self {
            id: None,
            meeting_id,
            status: ExtractionStatus::Succeeded,
            model,
            fields,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record for a run where every provider failed
    pub fn failed(meeting_id: i64, error: String) -> Self {
        let now = now_millis();
        Self {
            id: None,
            meeting_id,
            status: ExtractionStatus::Failed,
            model: "unknown".to_string(),
            fields: ExtractionFields::default(),
            error: Some(error),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Token accounting reported by a backend, when available
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// One provider call for one extraction attempt (append-only audit row)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAttemptLog {
    pub id: Option<i64>,
    pub meeting_id: i64,
    pub provider: String,
    pub model: String,
    pub status: ExtractionStatus,
    pub raw_response: Option<String>,
    pub duration_ms: u64,
    pub token_usage: Option<TokenUsage>,
    pub error: Option<String>,
    pub created_at: i64,
}

/// Result of running the pipeline for one meeting
///
/// Exhausting every provider is a normal outcome (`status: Failed`), not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub meeting_id: i64,
    pub extraction: Option<ExtractionFields>,
    pub status: ExtractionStatus,
    pub model: Option<String>,
    pub error: Option<String>,
}

/// Which meetings a batch run should pick up
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// Meetings with no extraction record
    AllPending,
    /// Pending meetings plus failed-and-unresolved ones
    PendingAndFailed,
    /// Only failed-and-unresolved meetings
    OnlyFailed,
}

impl std::fmt::Display for BatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchMode::AllPending => write!(f, "pending"),
            BatchMode::PendingAndFailed => write!(f, "pending-and-failed"),
            BatchMode::OnlyFailed => write!(f, "only-failed"),
        }
    }
}

impl std::str::FromStr for BatchMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" | "all-pending" => Ok(BatchMode::AllPending),
            "pending-and-failed" => Ok(BatchMode::PendingAndFailed),
            "only-failed" | "failed" => Ok(BatchMode::OnlyFailed),
            other => Err(AppError::InvalidInput(format!(
                "Invalid batch mode: {}. Must be 'pending', 'pending-and-failed' or 'only-failed'",
                other
            ))),
        }
    }
}

/// Aggregate counters for one batch invocation (not persisted)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchJobResult {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    /// Items that came from the "no extraction yet" set
    pub pending: usize,
    /// Items that came from the "failed and unresolved" set
    pub retried: usize,
}
