use convoy_store::IncidentStatus;

/// Bump whenever an entry in [`STAGE_TABLE`] is added, removed or changed.
pub const STAGE_TABLE_VERSION: u32 = 1;

/// Fields written onto the linked order record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderMutation {
    /// New `status`
    pub status: Option<&'static str>,
    /// New `supplierStatus`
    pub supplier_status: Option<&'static str>,
    /// Copy `data.carrier` onto the order
    pub carrier_from_data: bool,
    /// Also broadcast on `shipment-updated`
    pub affects_shipment: bool,
}

/// Domain side effect of an agent stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEffect {
    /// Patch the linked order
    Order(OrderMutation),
    /// Resolve the linked incident
    ResolveIncident(IncidentStatus),
}

const STAGE_TABLE: &[(&str, StageEffect)] = &[
    (
        "carrier_booked",
        StageEffect::Order(OrderMutation {
            status: Some("BOOKED"),
            supplier_status: None,
            carrier_from_data: true,
            affects_shipment: true,
        }),
    ),
    (
        "shipment_dispatched",
        StageEffect::Order(OrderMutation {
            status: Some("IN_TRANSIT"),
            supplier_status: None,
            carrier_from_data: false,
            affects_shipment: true,
        }),
    ),
    (
        "delivery_confirmed",
        StageEffect::Order(OrderMutation {
            status: Some("DELIVERED"),
            supplier_status: None,
            carrier_from_data: false,
            affects_shipment: true,
        }),
    ),
    (
        "supplier_confirmed",
        StageEffect::Order(OrderMutation {
            status: None,
            supplier_status: Some("CONFIRMED"),
            carrier_from_data: false,
            affects_shipment: false,
        }),
    ),
    (
        "incident_resolved",
        StageEffect::ResolveIncident(IncidentStatus::Resolved),
    ),
    (
        "incident_failed",
        StageEffect::ResolveIncident(IncidentStatus::Failed),
    ),
];

/// Side effect bound to `stage`, if any. Exact, case-sensitive match.
#[must_use]
pub fn stage_effect(stage: &str) -> Option<StageEffect> {
    STAGE_TABLE
        .iter()
        .find(|(name, _)| *name == stage)
        .map(|(_, effect)| *effect)
}
