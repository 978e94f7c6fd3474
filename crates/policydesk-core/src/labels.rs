//! Ukrainian display names and badge severities.

use serde::Serialize;

use crate::{CarInsurancePeriodUnit, OsagoZone, PersonStatus, PolicyStatus, PolicyType, Sex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warn,
    Danger,
    Secondary,
}

pub trait Localized {
    fn label(&self) -> &'static str;
}

impl Localized for PolicyType {
    fn label(&self) -> &'static str {
        match self {
            PolicyType::GreenCard => "Зелена карта",
            PolicyType::Medassistance => "Медасистанс",
            PolicyType::Osago => "ОСАГО",
        }
    }
}

impl Localized for PolicyStatus {
    fn label(&self) -> &'static str {
        match self {
            PolicyStatus::Active => "Активний",
            PolicyStatus::Project => "Проєкт",
            PolicyStatus::Prolonged => "Пролонгований",
            PolicyStatus::Rejected => "Відхилено",
            PolicyStatus::Stopped => "Зупинено",
            PolicyStatus::Postponed => "Відкладено",
            PolicyStatus::Cancelled => "Розірвано",
            PolicyStatus::Replaced => "Замінено",
            PolicyStatus::Expired => "Закінчився",
        }
    }
}

impl Localized for CarInsurancePeriodUnit {
    fn label(&self) -> &'static str {
        match self {
            CarInsurancePeriodUnit::Day => "днів",
            CarInsurancePeriodUnit::Month => "місяців",
            CarInsurancePeriodUnit::Year => "років",
        }
    }
}

impl Localized for OsagoZone {
    fn label(&self) -> &'static str {
        match self {
            OsagoZone::Zone1 => "Зона 1",
            OsagoZone::Zone2 => "Зона 2",
            OsagoZone::Zone3 => "Зона 3",
            OsagoZone::Zone4 => "Зона 4",
            OsagoZone::Zone5 => "Зона 5",
            OsagoZone::Outside => "Поза Україною",
        }
    }
}

impl Localized for Sex {
    fn label(&self) -> &'static str {
        match self {
            Sex::M => "Чоловіча",
            Sex::F => "Жіноча",
            Sex::Unknown => "Невідомо",
        }
    }
}

impl Localized for PersonStatus {
    fn label(&self) -> &'static str {
        match self {
            PersonStatus::Active => "Активний",
            PersonStatus::Inactive => "Неактивний",
            PersonStatus::Archived => "Архівований",
        }
    }
}

impl PolicyStatus {
    pub fn severity(&self) -> Severity {
        match self {
            PolicyStatus::Active | PolicyStatus::Prolonged => Severity::Success,
            PolicyStatus::Project => Severity::Info,
            PolicyStatus::Expired | PolicyStatus::Postponed | PolicyStatus::Stopped => {
                Severity::Warn
            }
            PolicyStatus::Rejected | PolicyStatus::Cancelled | PolicyStatus::Replaced => {
                Severity::Danger
            }
        }
    }
}

impl PersonStatus {
    pub fn severity(&self) -> Severity {
        match self {
            PersonStatus::Active => Severity::Success,
            PersonStatus::Inactive => Severity::Warn,
            PersonStatus::Archived => Severity::Secondary,
        }
    }
}
