use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tailor_core::{Aggregate, AggregateRoot, DomainError, Money, Rate, typed_id};
use tailor_events::Event;

typed_id!(
    /// Customer or supplier identifier.
    PartyId
);

/// Party kind: customer or supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Customer,
    Supplier,
}

/// Party status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    Active,
    Suspended,
}

/// Customer pricing tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerTier {
    #[default]
    Regular,
    Vip,
    Wholesale,
}

/// Contact information for a party.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub address: Option<String>,
}

/// Customer-only terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerTerms {
    pub tier: CustomerTier,
    /// Applied on top of any document discount.
    pub discount: Rate,
}

/// Supplier-only terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierTerms {
    pub credit_limit: Money,
    pub payment_terms: Option<String>,
    pub company_name: Option<String>,
    pub tax_number: Option<String>,
}

/// Kind-specific part of a party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PartyTerms {
    Customer(CustomerTerms),
    Supplier(SupplierTerms),
}

impl PartyTerms {
    pub fn kind(&self) -> PartyKind {
        match self {
            PartyTerms::Customer(_) => PartyKind::Customer,
            PartyTerms::Supplier(_) => PartyKind::Supplier,
        }
    }
}

/// Aggregate root: Party (customer or supplier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    id: PartyId,
    code: String,
    name: String,
    contact: ContactInfo,
    terms: PartyTerms,
    notes: Option<String>,
    status: PartyStatus,
    loyalty_points: i64,
    registered_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Party {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PartyId) -> Self {
        Self {
            id,
            code: String::new(),
            name: String::new(),
            contact: ContactInfo::default(),
            terms: PartyTerms::Customer(CustomerTerms::default()),
            notes: None,
            status: PartyStatus::Active,
            loyalty_points: 0,
            registered_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PartyId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn kind(&self) -> PartyKind {
        self.terms.kind()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn terms(&self) -> &PartyTerms {
        &self.terms
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> PartyStatus {
        self.status
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        self.registered_at
    }

    pub fn loyalty_points(&self) -> i64 {
        self.loyalty_points
    }

    /// Customer discount rate; zero for suppliers.
    pub fn discount(&self) -> Rate {
        match &self.terms {
            PartyTerms::Customer(terms) => terms.discount,
            PartyTerms::Supplier(_) => Rate::ZERO,
        }
    }

    /// Invariant helper: whether this party is allowed to transact.
    ///
    /// Suspended parties cannot transact.
    pub fn can_transact(&self) -> bool {
        self.status == PartyStatus::Active
    }
}

impl AggregateRoot for Party {
    type Id = PartyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterParty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterParty {
    pub party_id: PartyId,
    /// Code from the counter service (e.g. `CUST/00001`).
    pub code: String,
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub terms: PartyTerms,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateDetails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub party_id: PartyId,
    /// Optional new name (if None, keep existing).
    pub name: Option<String>,
    /// Optional new contact info (if None, keep existing).
    pub contact: Option<ContactInfo>,
    /// Optional new terms; must keep the party's kind.
    pub terms: Option<PartyTerms>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SuspendParty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendParty {
    pub party_id: PartyId,
    /// Optional human-readable reason for suspension.
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReactivateParty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateParty {
    pub party_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustLoyalty (customers only).
///
/// `earned` is added and `used` removed in one step so a sale confirmation or
/// its reversal is a single balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustLoyalty {
    pub party_id: PartyId,
    pub earned: i64,
    pub used: i64,
    /// Name of the document causing the change.
    pub document: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyCommand {
    RegisterParty(RegisterParty),
    UpdateDetails(UpdateDetails),
    SuspendParty(SuspendParty),
    ReactivateParty(ReactivateParty),
    AdjustLoyalty(AdjustLoyalty),
}

/// Event: PartyRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRegistered {
    pub party_id: PartyId,
    pub code: String,
    pub name: String,
    pub contact: ContactInfo,
    pub terms: PartyTerms,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartyUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyUpdated {
    pub party_id: PartyId,
    pub name: String,
    pub contact: ContactInfo,
    pub terms: PartyTerms,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartySuspended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySuspended {
    pub party_id: PartyId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartyReactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyReactivated {
    pub party_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LoyaltyAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyAdjusted {
    pub party_id: PartyId,
    pub earned: i64,
    pub used: i64,
    pub balance: i64,
    pub document: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyEvent {
    PartyRegistered(PartyRegistered),
    PartyUpdated(PartyUpdated),
    PartySuspended(PartySuspended),
    PartyReactivated(PartyReactivated),
    LoyaltyAdjusted(LoyaltyAdjusted),
}

impl Event for PartyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PartyEvent::PartyRegistered(_) => "parties.party.registered",
            PartyEvent::PartyUpdated(_) => "parties.party.updated",
            PartyEvent::PartySuspended(_) => "parties.party.suspended",
            PartyEvent::PartyReactivated(_) => "parties.party.reactivated",
            PartyEvent::LoyaltyAdjusted(_) => "parties.party.loyalty_adjusted",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PartyEvent::PartyRegistered(e) => e.occurred_at,
            PartyEvent::PartyUpdated(e) => e.occurred_at,
            PartyEvent::PartySuspended(e) => e.occurred_at,
            PartyEvent::PartyReactivated(e) => e.occurred_at,
            PartyEvent::LoyaltyAdjusted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Party {
    type Command = PartyCommand;
    type Event = PartyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PartyEvent::PartyRegistered(e) => {
                self.id = e.party_id;
                self.code = e.code.clone();
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.terms = e.terms.clone();
                self.notes = e.notes.clone();
                self.status = PartyStatus::Active;
                self.loyalty_points = 0;
                self.registered_at = Some(e.occurred_at);
                self.created = true;
            }
            PartyEvent::PartyUpdated(e) => {
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.terms = e.terms.clone();
                self.notes = e.notes.clone();
            }
            PartyEvent::PartySuspended(_) => {
                self.status = PartyStatus::Suspended;
            }
            PartyEvent::PartyReactivated(_) => {
                self.status = PartyStatus::Active;
            }
            PartyEvent::LoyaltyAdjusted(e) => {
                self.loyalty_points = e.balance;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PartyCommand::RegisterParty(cmd) => self.handle_register(cmd),
            PartyCommand::UpdateDetails(cmd) => self.handle_update(cmd),
            PartyCommand::SuspendParty(cmd) => self.handle_suspend(cmd),
            PartyCommand::ReactivateParty(cmd) => self.handle_reactivate(cmd),
            PartyCommand::AdjustLoyalty(cmd) => self.handle_adjust_loyalty(cmd),
        }
    }
}

impl Party {
    fn ensure_created(&self, party_id: PartyId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::missing(format!("party {party_id}")));
        }
        if self.id != party_id {
            return Err(DomainError::invariant("party_id mismatch"));
        }
        Ok(())
    }

    fn validate_terms(terms: &PartyTerms) -> Result<(), DomainError> {
        if let PartyTerms::Supplier(s) = terms {
            if s.credit_limit.is_negative() {
                return Err(DomainError::validation("credit limit cannot be negative"));
            }
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterParty) -> Result<Vec<PartyEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("party already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Self::validate_terms(&cmd.terms)?;

        let contact = cmd.contact.clone().unwrap_or_default();

        Ok(vec![PartyEvent::PartyRegistered(PartyRegistered {
            party_id: cmd.party_id,
            code: cmd.code.clone(),
            name: cmd.name.trim().to_string(),
            contact,
            terms: cmd.terms.clone(),
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateDetails) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_created(cmd.party_id)?;

        let new_name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if new_name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        let new_terms = cmd.terms.clone().unwrap_or_else(|| self.terms.clone());
        if new_terms.kind() != self.kind() {
            return Err(DomainError::validation(
                "a customer cannot become a supplier or vice versa",
            ));
        }
        Self::validate_terms(&new_terms)?;

        let new_contact = cmd.contact.clone().unwrap_or_else(|| self.contact.clone());

        Ok(vec![PartyEvent::PartyUpdated(PartyUpdated {
            party_id: cmd.party_id,
            name: new_name.trim().to_string(),
            contact: new_contact,
            terms: new_terms,
            notes: cmd.notes.clone().or_else(|| self.notes.clone()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendParty) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_created(cmd.party_id)?;

        if self.status == PartyStatus::Suspended {
            return Err(DomainError::conflict("party is already suspended"));
        }

        Ok(vec![PartyEvent::PartySuspended(PartySuspended {
            party_id: cmd.party_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(&self, cmd: &ReactivateParty) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_created(cmd.party_id)?;

        if self.status == PartyStatus::Active {
            return Err(DomainError::conflict("party is already active"));
        }

        Ok(vec![PartyEvent::PartyReactivated(PartyReactivated {
            party_id: cmd.party_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust_loyalty(&self, cmd: &AdjustLoyalty) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_created(cmd.party_id)?;

        if self.kind() != PartyKind::Customer {
            return Err(DomainError::validation("only customers hold loyalty points"));
        }
        if cmd.earned < 0 || cmd.used < 0 {
            return Err(DomainError::validation("loyalty points cannot be negative"));
        }
        if cmd.earned == 0 && cmd.used == 0 {
            return Ok(vec![]);
        }
        if cmd.used > self.loyalty_points + cmd.earned {
            return Err(DomainError::invariant(format!(
                "{} loyalty points requested but customer holds {}",
                cmd.used, self.loyalty_points
            )));
        }

        Ok(vec![PartyEvent::LoyaltyAdjusted(LoyaltyAdjusted {
            party_id: cmd.party_id,
            earned: cmd.earned,
            used: cmd.used,
            balance: self.loyalty_points + cmd.earned - cmd.used,
            document: cmd.document.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
