use super::core::SqliteImportStore;
use crate::domain::live::{
    Customer, CustomerLocation, DeletionCheck, GlEntry, Invoice, InvoiceLineItem, Part, Ticket,
    Vendor,
};
use crate::repository::error::RepositoryResult;
use crate::repository::import_store::{DependencyChecker, LiveRecordCounts, LiveRecordRepository};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};

// ==========================================
// 列清单与行映射
// ==========================================

const CUSTOMER_COLUMNS: &str = r#"
    id, name, email, phone, notes, external_customer_id, import_batch_id,
    created_by, created_at, updated_by, updated_at
"#;

const INVOICE_COLUMNS: &str = r#"
    id, invoice_number, customer_id, issue_date, due_date, total, balance_due,
    status, external_invoice_number, import_batch_id, created_by, created_at
"#;

const VENDOR_COLUMNS: &str = r#"
    id, name, email, phone, address, city, state, postal_code,
    vendor_code, external_vendor_id, import_batch_id, created_by, updated_at
"#;

const PART_COLUMNS: &str = r#"
    id, sku, name, description, category, unit_cost, unit_price, quantity_on_hand,
    import_batch_id, created_by, updated_at
"#;

const TICKET_COLUMNS: &str = r#"
    id, customer_id, ticket_number, ticket_date, amount, description, status,
    import_batch_id, created_by, created_at
"#;

fn map_customer(row: &Row) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        notes: row.get(4)?,
        external_customer_id: row.get(5)?,
        import_batch_id: row.get(6)?,
        created_by: row.get(7)?,
        created_at: row.get(8)?,
        updated_by: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn map_invoice(row: &Row) -> rusqlite::Result<Invoice> {
    Ok(Invoice {
        id: row.get(0)?,
        invoice_number: row.get(1)?,
        customer_id: row.get(2)?,
        issue_date: row.get(3)?,
        due_date: row.get(4)?,
        total: row.get(5)?,
        balance_due: row.get(6)?,
        status: row.get(7)?,
        external_invoice_number: row.get(8)?,
        import_batch_id: row.get(9)?,
        created_by: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn map_vendor(row: &Row) -> rusqlite::Result<Vendor> {
    Ok(Vendor {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        address: row.get(4)?,
        city: row.get(5)?,
        state: row.get(6)?,
        postal_code: row.get(7)?,
        vendor_code: row.get(8)?,
        external_vendor_id: row.get(9)?,
        import_batch_id: row.get(10)?,
        created_by: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn map_part(row: &Row) -> rusqlite::Result<Part> {
    Ok(Part {
        id: row.get(0)?,
        sku: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        unit_cost: row.get(5)?,
        unit_price: row.get(6)?,
        quantity_on_hand: row.get(7)?,
        import_batch_id: row.get(8)?,
        created_by: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn map_ticket(row: &Row) -> rusqlite::Result<Ticket> {
    Ok(Ticket {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        ticket_number: row.get(2)?,
        ticket_date: row.get(3)?,
        amount: row.get(4)?,
        description: row.get(5)?,
        status: row.get(6)?,
        import_batch_id: row.get(7)?,
        created_by: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn insert_location(conn: &Connection, location: &CustomerLocation) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        INSERT INTO customer_locations (
            id, customer_id, address, city, state, postal_code, is_primary, import_batch_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            location.id,
            location.customer_id,
            location.address,
            location.city,
            location.state,
            location.postal_code,
            location.is_primary,
            location.import_batch_id,
        ],
    )
}

fn count_where(conn: &Connection, sql: &str, id: &str) -> rusqlite::Result<i64> {
    conn.query_row(sql, params![id], |row| row.get(0))
}

#[async_trait]
impl LiveRecordRepository for SqliteImportStore {
    // ==========================================
    // 客户
    // ==========================================

    async fn find_customer(&self, customer_id: &str) -> RepositoryResult<Option<Customer>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM customers WHERE id = ?1", CUSTOMER_COLUMNS);
        Ok(conn
            .query_row(&sql, params![customer_id], map_customer)
            .optional()?)
    }

    async fn find_customer_by_external_id(
        &self,
        external_customer_id: &str,
    ) -> RepositoryResult<Option<Customer>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM customers WHERE external_customer_id = ?1 ORDER BY created_at LIMIT 1",
            CUSTOMER_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![external_customer_id], map_customer)
            .optional()?)
    }

    async fn insert_customer(
        &self,
        customer: &Customer,
        location: Option<&CustomerLocation>,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO customers (
                id, name, email, phone, notes, external_customer_id, import_batch_id,
                created_by, created_at, updated_by, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                customer.id,
                customer.name,
                customer.email,
                customer.phone,
                customer.notes,
                customer.external_customer_id,
                customer.import_batch_id,
                customer.created_by,
                customer.created_at,
                customer.updated_by,
                customer.updated_at,
            ],
        )?;

        if let Some(location) = location {
            insert_location(&tx, location)?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn update_customer(
        &self,
        customer: &Customer,
        location: Option<&CustomerLocation>,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        // import_batch_id 不改写: 更新的记录不归属本批次
        tx.execute(
            r#"
            UPDATE customers
            SET name = ?1, email = ?2, phone = ?3, notes = ?4,
                updated_by = ?5, updated_at = ?6
            WHERE id = ?7
            "#,
            params![
                customer.name,
                customer.email,
                customer.phone,
                customer.notes,
                customer.updated_by,
                customer.updated_at,
                customer.id,
            ],
        )?;

        if let Some(location) = location {
            let primary_id: Option<String> = tx
                .query_row(
                    "SELECT id FROM customer_locations WHERE customer_id = ?1 AND is_primary = 1 LIMIT 1",
                    params![customer.id],
                    |row| row.get(0),
                )
                .optional()?;

            match primary_id {
                Some(id) => {
                    tx.execute(
                        r#"
                        UPDATE customer_locations
                        SET address = COALESCE(?1, address), city = COALESCE(?2, city),
                            state = COALESCE(?3, state), postal_code = COALESCE(?4, postal_code)
                        WHERE id = ?5
                        "#,
                        params![
                            location.address,
                            location.city,
                            location.state,
                            location.postal_code,
                            id,
                        ],
                    )?;
                }
                None => {
                    insert_location(&tx, location)?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    // ==========================================
    // 发票
    // ==========================================

    async fn find_invoice_for_customer(
        &self,
        customer_id: &str,
        external_invoice_number: &str,
    ) -> RepositoryResult<Option<Invoice>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM invoices
            WHERE customer_id = ?1
              AND (external_invoice_number = ?2 OR invoice_number = ?2)
            LIMIT 1
            "#,
            INVOICE_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![customer_id, external_invoice_number], map_invoice)
            .optional()?)
    }

    async fn insert_invoice(
        &self,
        invoice: &Invoice,
        line_items: &[InvoiceLineItem],
        gl_entries: &[GlEntry],
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO invoices (
                id, invoice_number, customer_id, issue_date, due_date, total, balance_due,
                status, external_invoice_number, import_batch_id, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                invoice.id,
                invoice.invoice_number,
                invoice.customer_id,
                invoice.issue_date,
                invoice.due_date,
                invoice.total,
                invoice.balance_due,
                invoice.status,
                invoice.external_invoice_number,
                invoice.import_batch_id,
                invoice.created_by,
                invoice.created_at,
            ],
        )?;

        for item in line_items {
            tx.execute(
                r#"
                INSERT INTO invoice_line_items (id, invoice_id, description, quantity, unit_price, amount)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    item.id,
                    item.invoice_id,
                    item.description,
                    item.quantity,
                    item.unit_price,
                    item.amount,
                ],
            )?;
        }

        for entry in gl_entries {
            tx.execute(
                r#"
                INSERT INTO gl_entries (
                    id, invoice_id, account, debit, credit, entry_date, memo, import_batch_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    entry.id,
                    entry.invoice_id,
                    entry.account,
                    entry.debit,
                    entry.credit,
                    entry.entry_date,
                    entry.memo,
                    entry.import_batch_id,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    // ==========================================
    // 供应商
    // ==========================================

    async fn find_vendor_by_code(&self, vendor_code: &str) -> RepositoryResult<Option<Vendor>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM vendors WHERE vendor_code = ?1 LIMIT 1", VENDOR_COLUMNS);
        Ok(conn.query_row(&sql, params![vendor_code], map_vendor).optional()?)
    }

    async fn find_vendor_by_external_id(
        &self,
        external_vendor_id: &str,
    ) -> RepositoryResult<Option<Vendor>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM vendors WHERE external_vendor_id = ?1 LIMIT 1",
            VENDOR_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![external_vendor_id], map_vendor)
            .optional()?)
    }

    async fn insert_vendor(&self, vendor: &Vendor) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO vendors (
                id, name, email, phone, address, city, state, postal_code,
                vendor_code, external_vendor_id, import_batch_id, created_by, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                vendor.id,
                vendor.name,
                vendor.email,
                vendor.phone,
                vendor.address,
                vendor.city,
                vendor.state,
                vendor.postal_code,
                vendor.vendor_code,
                vendor.external_vendor_id,
                vendor.import_batch_id,
                vendor.created_by,
                vendor.updated_at,
            ],
        )?;
        Ok(())
    }

    async fn update_vendor(&self, vendor: &Vendor) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            UPDATE vendors
            SET name = ?1, email = ?2, phone = ?3, address = ?4, city = ?5, state = ?6,
                postal_code = ?7, vendor_code = ?8, external_vendor_id = ?9, updated_at = ?10
            WHERE id = ?11
            "#,
            params![
                vendor.name,
                vendor.email,
                vendor.phone,
                vendor.address,
                vendor.city,
                vendor.state,
                vendor.postal_code,
                vendor.vendor_code,
                vendor.external_vendor_id,
                vendor.updated_at,
                vendor.id,
            ],
        )?;
        Ok(())
    }

    // ==========================================
    // 配件
    // ==========================================

    async fn find_part_by_sku(&self, sku: &str) -> RepositoryResult<Option<Part>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM parts WHERE sku = ?1 LIMIT 1", PART_COLUMNS);
        Ok(conn.query_row(&sql, params![sku], map_part).optional()?)
    }

    async fn insert_part(&self, part: &Part) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO parts (
                id, sku, name, description, category, unit_cost, unit_price,
                quantity_on_hand, import_batch_id, created_by, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                part.id,
                part.sku,
                part.name,
                part.description,
                part.category,
                part.unit_cost,
                part.unit_price,
                part.quantity_on_hand,
                part.import_batch_id,
                part.created_by,
                part.updated_at,
            ],
        )?;
        Ok(())
    }

    async fn update_part(&self, part: &Part) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            UPDATE parts
            SET name = ?1, description = ?2, category = ?3, unit_cost = ?4,
                unit_price = ?5, quantity_on_hand = ?6, updated_at = ?7
            WHERE id = ?8
            "#,
            params![
                part.name,
                part.description,
                part.category,
                part.unit_cost,
                part.unit_price,
                part.quantity_on_hand,
                part.updated_at,
                part.id,
            ],
        )?;
        Ok(())
    }

    // ==========================================
    // 工单
    // ==========================================

    async fn find_ticket(
        &self,
        customer_id: &str,
        ticket_number: &str,
    ) -> RepositoryResult<Option<Ticket>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM tickets WHERE customer_id = ?1 AND ticket_number = ?2 LIMIT 1",
            TICKET_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![customer_id, ticket_number], map_ticket)
            .optional()?)
    }

    async fn insert_ticket(&self, ticket: &Ticket) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO tickets (
                id, customer_id, ticket_number, ticket_date, amount, description, status,
                import_batch_id, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                ticket.id,
                ticket.customer_id,
                ticket.ticket_number,
                ticket.ticket_date,
                ticket.amount,
                ticket.description,
                ticket.status,
                ticket.import_batch_id,
                ticket.created_by,
                ticket.created_at,
            ],
        )?;
        Ok(())
    }

    // ==========================================
    // 回滚支持
    // ==========================================

    async fn list_batch_customers(&self, batch_id: &str) -> RepositoryResult<Vec<Customer>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM customers WHERE import_batch_id = ?1 ORDER BY created_at, id",
            CUSTOMER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let customers = stmt
            .query_map(params![batch_id], map_customer)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(customers)
    }

    async fn list_batch_invoices(&self, batch_id: &str) -> RepositoryResult<Vec<Invoice>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM invoices WHERE import_batch_id = ?1 ORDER BY created_at, id",
            INVOICE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let invoices = stmt
            .query_map(params![batch_id], map_invoice)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(invoices)
    }

    async fn delete_customer_cascade(&self, customer_id: &str) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM customer_locations WHERE customer_id = ?1",
            params![customer_id],
        )?;
        tx.execute("DELETE FROM customers WHERE id = ?1", params![customer_id])?;
        tx.commit()?;
        Ok(())
    }

    async fn delete_invoice_cascade(&self, invoice_id: &str) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM invoice_line_items WHERE invoice_id = ?1",
            params![invoice_id],
        )?;
        tx.execute("DELETE FROM gl_entries WHERE invoice_id = ?1", params![invoice_id])?;
        tx.execute("DELETE FROM invoices WHERE id = ?1", params![invoice_id])?;
        tx.commit()?;
        Ok(())
    }

    async fn count_live_records(&self, batch_id: &str) -> RepositoryResult<LiveRecordCounts> {
        let conn = self.get_conn()?;
        let customers = count_where(
            &conn,
            "SELECT COUNT(*) FROM customers WHERE import_batch_id = ?1",
            batch_id,
        )?;
        let invoices = count_where(
            &conn,
            "SELECT COUNT(*) FROM invoices WHERE import_batch_id = ?1",
            batch_id,
        )?;
        Ok(LiveRecordCounts {
            customers,
            invoices,
        })
    }
}

// ==========================================
// 删除安全性判定
// ==========================================
#[async_trait]
impl DependencyChecker for SqliteImportStore {
    async fn can_delete_customer(&self, customer_id: &str) -> RepositoryResult<DeletionCheck> {
        let conn = self.get_conn()?;
        let tickets = count_where(
            &conn,
            "SELECT COUNT(*) FROM tickets WHERE customer_id = ?1",
            customer_id,
        )?;
        let invoices = count_where(
            &conn,
            "SELECT COUNT(*) FROM invoices WHERE customer_id = ?1",
            customer_id,
        )?;
        let payments = count_where(
            &conn,
            "SELECT COUNT(*) FROM payments WHERE customer_id = ?1",
            customer_id,
        )?;

        if tickets == 0 && invoices == 0 && payments == 0 {
            return Ok(DeletionCheck::allowed());
        }

        let mut parts = Vec::new();
        if tickets > 0 {
            parts.push(format!("{} 个工单", tickets));
        }
        if invoices > 0 {
            parts.push(format!("{} 张发票", invoices));
        }
        if payments > 0 {
            parts.push(format!("{} 笔收款", payments));
        }
        Ok(DeletionCheck::blocked(format!("存在关联记录: {}", parts.join("、"))))
    }

    async fn can_delete_invoice(&self, invoice_id: &str) -> RepositoryResult<DeletionCheck> {
        let conn = self.get_conn()?;
        let payments = count_where(
            &conn,
            "SELECT COUNT(*) FROM payments WHERE invoice_id = ?1",
            invoice_id,
        )?;

        if payments == 0 {
            Ok(DeletionCheck::allowed())
        } else {
            Ok(DeletionCheck::blocked(format!("存在关联记录: {} 笔收款", payments)))
        }
    }
}
