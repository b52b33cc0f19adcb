//! # Default Catalog
//!
//! A small general chart of accounts with every special-account tag the
//! engine resolves, plus standard taxes, series, withholdings and a cash
//! payment method. Used by the `seed` binary and by tests.
//!
//! ```text
//!   1    Basic financing          129  Profit and loss             [PYG]
//!   4    Creditors and debtors    400  Suppliers                   [PROVEE]
//!                                 430  Customers                   [CLIENT]
//!                                 472  Input VAT                   [IVASOP]
//!                                 473  Withholdings receivable     [IRPF]
//!                                 4751 Withholdings payable        [IRPFPR]
//!                                 477  Output VAT                  [IVAREP]
//!   5    Financial accounts       554  Supplied expenses           [SUPLI]
//!                                 570  Cash                        [CAJA]
//!   6    Purchases and expenses   600  Purchases                   [COMPRA]
//!                                 608  Purchase returns            [DEVCOM]
//!                                 626  Bank fees                   [GTOBAN]
//!   7    Sales and income         700  Sales                       [VENTAS]
//!                                 708  Sales returns               [DEVVEN]
//! ```

use rust_decimal::Decimal;

use crate::accounting::{fill_to_length, Account, SpecialAccount, SubAccount};
use crate::error::CoreResult;
use crate::types::{PaymentMethod, Series, Tax, TaxType, Withholding};

/// `(code, description, parent, tag)`
const ACCOUNTS: &[(&str, &str, Option<&str>, Option<SpecialAccount>)] = &[
    ("1", "Basic financing", None, None),
    ("129", "Profit and loss", Some("1"), Some(SpecialAccount::ProfitLoss)),
    ("4", "Creditors and debtors", None, None),
    ("400", "Suppliers", Some("4"), Some(SpecialAccount::Supplier)),
    ("430", "Customers", Some("4"), Some(SpecialAccount::Customer)),
    ("472", "Input VAT", Some("4"), Some(SpecialAccount::VatInput)),
    ("473", "Withholdings receivable", Some("4"), Some(SpecialAccount::WithholdingSales)),
    ("4751", "Withholdings payable", Some("4"), Some(SpecialAccount::WithholdingPurchases)),
    ("477", "Output VAT", Some("4"), Some(SpecialAccount::VatOutput)),
    ("5", "Financial accounts", None, None),
    ("554", "Supplied expenses", Some("5"), Some(SpecialAccount::Supplied)),
    ("570", "Cash", Some("5"), Some(SpecialAccount::Cash)),
    ("6", "Purchases and expenses", None, None),
    ("600", "Purchases", Some("6"), Some(SpecialAccount::Purchases)),
    ("608", "Purchase returns", Some("6"), Some(SpecialAccount::PurchaseReturns)),
    ("626", "Bank fees", Some("6"), Some(SpecialAccount::BankFees)),
    ("7", "Sales and income", None, None),
    ("700", "Sales", Some("7"), Some(SpecialAccount::Sales)),
    ("708", "Sales returns", Some("7"), Some(SpecialAccount::SalesReturns)),
];

/// `(account, suffix, description, tag)`
const SUBACCOUNTS: &[(&str, &str, &str, SpecialAccount)] = &[
    ("129", "", "Profit and loss", SpecialAccount::ProfitLoss),
    ("472", "", "Input VAT", SpecialAccount::VatInput),
    ("472", "1", "Input equivalence surcharge", SpecialAccount::SurchargeInput),
    ("473", "", "Withholdings receivable", SpecialAccount::WithholdingSales),
    ("4751", "", "Withholdings payable", SpecialAccount::WithholdingPurchases),
    ("477", "", "Output VAT", SpecialAccount::VatOutput),
    ("477", "1", "Output equivalence surcharge", SpecialAccount::SurchargeOutput),
    ("554", "", "Supplied expenses", SpecialAccount::Supplied),
    ("570", "", "Cash", SpecialAccount::Cash),
    ("600", "", "Purchases", SpecialAccount::Purchases),
    ("608", "", "Purchase returns", SpecialAccount::PurchaseReturns),
    ("626", "", "Bank fees", SpecialAccount::BankFees),
    ("700", "", "Sales", SpecialAccount::Sales),
    ("708", "", "Sales returns", SpecialAccount::SalesReturns),
];

/// Accounts of the default chart for a period.
pub fn default_accounts(period_code: &str) -> Vec<Account> {
    ACCOUNTS
        .iter()
        .map(|(code, description, parent, special)| Account {
            code: code.to_string(),
            period_code: period_code.to_string(),
            description: description.to_string(),
            parent_code: parent.map(str::to_string),
            special: *special,
        })
        .collect()
}

/// Tagged sub-accounts of the default chart for a period.
///
/// Customer and supplier sub-accounts are not included; they are created on
/// demand.
pub fn default_subaccounts(period_code: &str, length: usize) -> CoreResult<Vec<SubAccount>> {
    SUBACCOUNTS
        .iter()
        .map(|(account, suffix, description, special)| {
            Ok(SubAccount {
                code: fill_to_length(length, account, suffix)?,
                period_code: period_code.to_string(),
                account_code: account.to_string(),
                description: description.to_string(),
                special: Some(*special),
            })
        })
        .collect()
}

fn vat(code: &str, description: &str, rate: Decimal, surcharge: Decimal) -> Tax {
    Tax {
        code: code.to_string(),
        description: description.to_string(),
        rate,
        surcharge,
        tax_type: TaxType::Percentage,
        input_subaccount: None,
        output_subaccount: None,
        input_surcharge_subaccount: None,
        output_surcharge_subaccount: None,
    }
}

/// Standard VAT rates with their equivalence surcharges.
pub fn default_taxes() -> Vec<Tax> {
    vec![
        vat("IVA21", "VAT 21%", Decimal::new(21, 0), Decimal::new(52, 1)),
        vat("IVA10", "VAT 10%", Decimal::new(10, 0), Decimal::new(14, 1)),
        vat("IVA4", "VAT 4%", Decimal::new(4, 0), Decimal::new(5, 1)),
        vat("IVA0", "VAT 0%", Decimal::ZERO, Decimal::ZERO),
    ]
}

/// General series `A` and rectifying series `R`.
pub fn default_series() -> Vec<Series> {
    vec![
        Series {
            code: "A".to_string(),
            description: "General".to_string(),
            tax_exempt: false,
            rectifying: false,
        },
        Series {
            code: "R".to_string(),
            description: "Rectifying".to_string(),
            tax_exempt: false,
            rectifying: true,
        },
    ]
}

pub fn default_withholdings() -> Vec<Withholding> {
    [("IRPF15", 15), ("IRPF7", 7)]
        .into_iter()
        .map(|(code, rate)| Withholding {
            code: code.to_string(),
            description: format!("Withholding {rate}%"),
            rate: Decimal::from(rate),
            sales_subaccount: None,
            purchase_subaccount: None,
        })
        .collect()
}

/// Cash payment method; settles through the `CAJA` special sub-account.
pub fn default_payment_methods() -> Vec<PaymentMethod> {
    vec![PaymentMethod {
        code: "CONT".to_string(),
        description: "Cash".to_string(),
        bank_subaccount: None,
        fee_subaccount: None,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_subaccount_has_a_parent_account() {
        let accounts: HashSet<String> = default_accounts("2025").into_iter().map(|a| a.code).collect();
        for sub in default_subaccounts("2025", 10).unwrap() {
            assert!(accounts.contains(&sub.account_code), "{}", sub.account_code);
            assert_eq!(sub.code.len(), 10);
            assert!(sub.code.starts_with(&sub.account_code));
        }
    }

    #[test]
    fn test_every_tag_is_present() {
        let subs = default_subaccounts("2025", 10).unwrap();
        for tag in SpecialAccount::ALL {
            if matches!(tag, SpecialAccount::Customer | SpecialAccount::Supplier) {
                continue;
            }
            assert!(subs.iter().any(|s| s.special == Some(tag)), "{tag}");
        }
        assert!(subs.iter().any(|s| s.code == "4770000001"));
    }

    #[test]
    fn test_default_taxes() {
        let taxes = default_taxes();
        let iva21 = taxes.iter().find(|t| t.code == "IVA21").unwrap();
        assert_eq!(iva21.rate, Decimal::from(21));
        assert_eq!(iva21.surcharge, Decimal::new(52, 1));
    }
}
