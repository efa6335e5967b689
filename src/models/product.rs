use serde::Serialize;

use crate::services::hana::{HanaRow, RowExt};

/// One catalog item with its group and attachment file names.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductRow {
    pub item_code: String,
    pub item_name: Option<String>,
    pub item_group_code: Option<i64>,
    pub item_group_name: Option<String>,
    pub catalog_name: Option<String>,
    pub generic_name: Option<String>,
    pub brand_name: Option<String>,
    pub sales_pack_unit: Option<String>,
    pub product_image: Option<String>,
    pub product_description_urdu: Option<String>,
}

impl ProductRow {
    pub fn from_row(row: &HanaRow) -> Option<Self> {
        let text = |name: &str| row.get_string(name).filter(|v| !v.is_empty());

        Some(Self {
            item_code: text("ItemCode")?,
            item_name: text("ItemName"),
            item_group_code: row.get_i64("ItmsGrpCod"),
            item_group_name: text("ItmsGrpNam"),
            catalog_name: text("Product_Catalog_Name"),
            generic_name: text("U_GenericName"),
            brand_name: text("U_BrandName"),
            sales_pack_unit: text("SalPackMsr"),
            product_image: text("Product_Image"),
            product_description_urdu: text("Product_Description_Urdu"),
        })
    }
}
