//! # Master Data Repository
//!
//! Taxes, tax zones, withholdings, series, subjects, customer groups,
//! families, products and payment methods.

use abaco_core::{
    CustomerGroup, Family, PaymentMethod, Product, Series, Subject, Tax, TaxZone, TradeSide,
    Withholding,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use crate::error::DbResult;
use crate::row::decimal;

const TAX_COLUMNS: &str = "code, description, rate, surcharge, tax_type, input_subaccount, \
    output_subaccount, input_surcharge_subaccount, output_surcharge_subaccount";
const SUBJECT_COLUMNS: &str =
    "side, code, name, tax_id, subaccount, group_code, tax_regime, tax_exception";

/// Repository for reference data used by the calculator and the resolver.
pub struct MasterDataRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> MasterDataRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        MasterDataRepository { conn }
    }

    // =========================================================================
    // Taxes
    // =========================================================================

    pub async fn taxes(&mut self) -> DbResult<Vec<Tax>> {
        let sql = format!("SELECT {TAX_COLUMNS} FROM taxes ORDER BY code");
        let rows = sqlx::query(&sql).fetch_all(&mut *self.conn).await?;
        rows.iter().map(map_tax).collect()
    }

    pub async fn tax(&mut self, code: &str) -> DbResult<Option<Tax>> {
        let sql = format!("SELECT {TAX_COLUMNS} FROM taxes WHERE code = ?1");
        let row = sqlx::query(&sql)
            .bind(code)
            .fetch_optional(&mut *self.conn)
            .await?;
        row.as_ref().map(map_tax).transpose()
    }

    pub async fn save_tax(&mut self, tax: &Tax) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO taxes
                (code, description, rate, surcharge, tax_type, input_subaccount,
                 output_subaccount, input_surcharge_subaccount, output_surcharge_subaccount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (code) DO UPDATE SET
                description = excluded.description,
                rate = excluded.rate,
                surcharge = excluded.surcharge,
                tax_type = excluded.tax_type,
                input_subaccount = excluded.input_subaccount,
                output_subaccount = excluded.output_subaccount,
                input_surcharge_subaccount = excluded.input_surcharge_subaccount,
                output_surcharge_subaccount = excluded.output_surcharge_subaccount",
        )
        .bind(&tax.code)
        .bind(&tax.description)
        .bind(tax.rate.to_string())
        .bind(tax.surcharge.to_string())
        .bind(tax.tax_type)
        .bind(&tax.input_subaccount)
        .bind(&tax.output_subaccount)
        .bind(&tax.input_surcharge_subaccount)
        .bind(&tax.output_surcharge_subaccount)
        .execute(&mut *self.conn)
        .await?;
        debug!(code = %tax.code, rate = %tax.rate, "Tax saved");
        Ok(())
    }

    pub async fn tax_zones(&mut self) -> DbResult<Vec<TaxZone>> {
        let rows = sqlx::query(
            "SELECT id, tax_code, country, province, replacement_tax_code
             FROM tax_zones ORDER BY id",
        )
        .fetch_all(&mut *self.conn)
        .await?;
        rows.iter()
            .map(|row| -> DbResult<TaxZone> {
                Ok(TaxZone {
                    id: row.try_get("id")?,
                    tax_code: row.try_get("tax_code")?,
                    country: row.try_get("country")?,
                    province: row.try_get("province")?,
                    replacement_tax_code: row.try_get("replacement_tax_code")?,
                })
            })
            .collect()
    }

    /// Inserts a tax zone and returns its id; the `id` argument is ignored.
    pub async fn insert_tax_zone(&mut self, zone: &TaxZone) -> DbResult<i64> {
        let result = sqlx::query(
            "INSERT INTO tax_zones (tax_code, country, province, replacement_tax_code)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&zone.tax_code)
        .bind(&zone.country)
        .bind(&zone.province)
        .bind(&zone.replacement_tax_code)
        .execute(&mut *self.conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    // =========================================================================
    // Withholdings
    // =========================================================================

    pub async fn withholdings(&mut self) -> DbResult<Vec<Withholding>> {
        let rows = sqlx::query(
            "SELECT code, description, rate, sales_subaccount, purchase_subaccount
             FROM withholdings ORDER BY code",
        )
        .fetch_all(&mut *self.conn)
        .await?;
        rows.iter().map(map_withholding).collect()
    }

    pub async fn save_withholding(&mut self, w: &Withholding) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO withholdings (code, description, rate, sales_subaccount, purchase_subaccount)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (code) DO UPDATE SET
                description = excluded.description,
                rate = excluded.rate,
                sales_subaccount = excluded.sales_subaccount,
                purchase_subaccount = excluded.purchase_subaccount",
        )
        .bind(&w.code)
        .bind(&w.description)
        .bind(w.rate.to_string())
        .bind(&w.sales_subaccount)
        .bind(&w.purchase_subaccount)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Series
    // =========================================================================

    pub async fn series_list(&mut self) -> DbResult<Vec<Series>> {
        let rows = sqlx::query("SELECT code, description, tax_exempt, rectifying FROM series ORDER BY code")
            .fetch_all(&mut *self.conn)
            .await?;
        rows.iter().map(map_series).collect()
    }

    pub async fn series(&mut self, code: &str) -> DbResult<Option<Series>> {
        let row = sqlx::query("SELECT code, description, tax_exempt, rectifying FROM series WHERE code = ?1")
            .bind(code)
            .fetch_optional(&mut *self.conn)
            .await?;
        row.as_ref().map(map_series).transpose()
    }

    pub async fn save_series(&mut self, series: &Series) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO series (code, description, tax_exempt, rectifying)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (code) DO UPDATE SET
                description = excluded.description,
                tax_exempt = excluded.tax_exempt,
                rectifying = excluded.rectifying",
        )
        .bind(&series.code)
        .bind(&series.description)
        .bind(series.tax_exempt)
        .bind(series.rectifying)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Subjects and groups
    // =========================================================================

    /// Customer (`Sale`) or supplier (`Purchase`) by code.
    pub async fn subject(&mut self, side: TradeSide, code: &str) -> DbResult<Option<Subject>> {
        let sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE side = ?1 AND code = ?2");
        let row = sqlx::query(&sql)
            .bind(side)
            .bind(code)
            .fetch_optional(&mut *self.conn)
            .await?;
        row.as_ref().map(map_subject).transpose()
    }

    pub async fn save_subject(&mut self, subject: &Subject) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO subjects
                (side, code, name, tax_id, subaccount, group_code, tax_regime, tax_exception)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (side, code) DO UPDATE SET
                name = excluded.name,
                tax_id = excluded.tax_id,
                subaccount = excluded.subaccount,
                group_code = excluded.group_code,
                tax_regime = excluded.tax_regime,
                tax_exception = excluded.tax_exception",
        )
        .bind(subject.side)
        .bind(&subject.code)
        .bind(&subject.name)
        .bind(&subject.tax_id)
        .bind(&subject.subaccount)
        .bind(&subject.group_code)
        .bind(subject.tax_regime)
        .bind(&subject.tax_exception)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    /// Stores the sub-account generated for a subject.
    pub async fn set_subject_subaccount(&mut self, side: TradeSide, code: &str, subaccount: &str) -> DbResult<()> {
        debug!(?side, code, subaccount, "Subject sub-account assigned");
        sqlx::query("UPDATE subjects SET subaccount = ?1 WHERE side = ?2 AND code = ?3")
            .bind(subaccount)
            .bind(side)
            .bind(code)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    pub async fn customer_group(&mut self, code: &str) -> DbResult<Option<CustomerGroup>> {
        let row = sqlx::query("SELECT code, name, subaccount FROM customer_groups WHERE code = ?1")
            .bind(code)
            .fetch_optional(&mut *self.conn)
            .await?;
        row.as_ref()
            .map(|row| -> DbResult<CustomerGroup> {
                Ok(CustomerGroup {
                    code: row.try_get("code")?,
                    name: row.try_get("name")?,
                    subaccount: row.try_get("subaccount")?,
                })
            })
            .transpose()
    }

    pub async fn save_customer_group(&mut self, group: &CustomerGroup) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO customer_groups (code, name, subaccount) VALUES (?1, ?2, ?3)
             ON CONFLICT (code) DO UPDATE SET name = excluded.name, subaccount = excluded.subaccount",
        )
        .bind(&group.code)
        .bind(&group.name)
        .bind(&group.subaccount)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Products and families
    // =========================================================================

    pub async fn family(&mut self, code: &str) -> DbResult<Option<Family>> {
        let row = sqlx::query(
            "SELECT code, name, sales_subaccount, purchase_subaccount FROM families WHERE code = ?1",
        )
        .bind(code)
        .fetch_optional(&mut *self.conn)
        .await?;
        row.as_ref()
            .map(|row| -> DbResult<Family> {
                Ok(Family {
                    code: row.try_get("code")?,
                    name: row.try_get("name")?,
                    sales_subaccount: row.try_get("sales_subaccount")?,
                    purchase_subaccount: row.try_get("purchase_subaccount")?,
                })
            })
            .transpose()
    }

    pub async fn save_family(&mut self, family: &Family) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO families (code, name, sales_subaccount, purchase_subaccount)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (code) DO UPDATE SET
                name = excluded.name,
                sales_subaccount = excluded.sales_subaccount,
                purchase_subaccount = excluded.purchase_subaccount",
        )
        .bind(&family.code)
        .bind(&family.name)
        .bind(&family.sales_subaccount)
        .bind(&family.purchase_subaccount)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    pub async fn product(&mut self, reference: &str) -> DbResult<Option<Product>> {
        let row = sqlx::query(
            "SELECT reference, description, family_code, sales_subaccount, purchase_subaccount
             FROM products WHERE reference = ?1",
        )
        .bind(reference)
        .fetch_optional(&mut *self.conn)
        .await?;
        row.as_ref()
            .map(|row| -> DbResult<Product> {
                Ok(Product {
                    reference: row.try_get("reference")?,
                    description: row.try_get("description")?,
                    family_code: row.try_get("family_code")?,
                    sales_subaccount: row.try_get("sales_subaccount")?,
                    purchase_subaccount: row.try_get("purchase_subaccount")?,
                })
            })
            .transpose()
    }

    pub async fn save_product(&mut self, product: &Product) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO products
                (reference, description, family_code, sales_subaccount, purchase_subaccount)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (reference) DO UPDATE SET
                description = excluded.description,
                family_code = excluded.family_code,
                sales_subaccount = excluded.sales_subaccount,
                purchase_subaccount = excluded.purchase_subaccount",
        )
        .bind(&product.reference)
        .bind(&product.description)
        .bind(&product.family_code)
        .bind(&product.sales_subaccount)
        .bind(&product.purchase_subaccount)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Payment methods
    // =========================================================================

    pub async fn payment_method(&mut self, code: &str) -> DbResult<Option<PaymentMethod>> {
        let row = sqlx::query(
            "SELECT code, description, bank_subaccount, fee_subaccount
             FROM payment_methods WHERE code = ?1",
        )
        .bind(code)
        .fetch_optional(&mut *self.conn)
        .await?;
        row.as_ref()
            .map(|row| -> DbResult<PaymentMethod> {
                Ok(PaymentMethod {
                    code: row.try_get("code")?,
                    description: row.try_get("description")?,
                    bank_subaccount: row.try_get("bank_subaccount")?,
                    fee_subaccount: row.try_get("fee_subaccount")?,
                })
            })
            .transpose()
    }

    pub async fn save_payment_method(&mut self, method: &PaymentMethod) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO payment_methods (code, description, bank_subaccount, fee_subaccount)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (code) DO UPDATE SET
                description = excluded.description,
                bank_subaccount = excluded.bank_subaccount,
                fee_subaccount = excluded.fee_subaccount",
        )
        .bind(&method.code)
        .bind(&method.description)
        .bind(&method.bank_subaccount)
        .bind(&method.fee_subaccount)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }
}

fn map_tax(row: &SqliteRow) -> DbResult<Tax> {
    Ok(Tax {
        code: row.try_get("code")?,
        description: row.try_get("description")?,
        rate: decimal(row, "rate")?,
        surcharge: decimal(row, "surcharge")?,
        tax_type: row.try_get("tax_type")?,
        input_subaccount: row.try_get("input_subaccount")?,
        output_subaccount: row.try_get("output_subaccount")?,
        input_surcharge_subaccount: row.try_get("input_surcharge_subaccount")?,
        output_surcharge_subaccount: row.try_get("output_surcharge_subaccount")?,
    })
}

fn map_withholding(row: &SqliteRow) -> DbResult<Withholding> {
    Ok(Withholding {
        code: row.try_get("code")?,
        description: row.try_get("description")?,
        rate: decimal(row, "rate")?,
        sales_subaccount: row.try_get("sales_subaccount")?,
        purchase_subaccount: row.try_get("purchase_subaccount")?,
    })
}

fn map_series(row: &SqliteRow) -> DbResult<Series> {
    Ok(Series {
        code: row.try_get("code")?,
        description: row.try_get("description")?,
        tax_exempt: row.try_get("tax_exempt")?,
        rectifying: row.try_get("rectifying")?,
    })
}

fn map_subject(row: &SqliteRow) -> DbResult<Subject> {
    Ok(Subject {
        side: row.try_get("side")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        tax_id: row.try_get("tax_id")?,
        subaccount: row.try_get("subaccount")?,
        group_code: row.try_get("group_code")?,
        tax_regime: row.try_get("tax_regime")?,
        tax_exception: row.try_get("tax_exception")?,
    })
}
