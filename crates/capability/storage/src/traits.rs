//! 存储写入接口 Trait 定义
//!
//! 写入器句柄由接入会话独占持有，因此方法均取 `&mut self`。

use crate::error::WriteError;
use async_trait::async_trait;
use domain::{ConnectionError, Point};

/// 时序点位写入器。
#[async_trait]
pub trait PointWriter: Send {
    /// 建立并校验存储连接；失败对会话是致命的。
    async fn connect(&mut self) -> Result<(), ConnectionError> {
        Ok(())
    }

    /// 写入单个点位。
    async fn write(&mut self, point: &Point) -> Result<(), WriteError>;

    /// 批量写入（默认逐条写入）。
    async fn write_batch(&mut self, points: &[Point]) -> Result<(), WriteError> {
        for point in points {
            self.write(point).await?;
        }
        Ok(())
    }

    /// 释放存储句柄；之后的写入一律返回 `Unreachable`。
    async fn close(&mut self);
}
